//! kcatalog FFI - C ABI for kernel selection
//!
//! Design principles:
//! - All extern "C" functions use catch_unwind
//! - No panic across FFI boundary
//! - Catalog handles are owned by the library until `kcat_catalog_free`
//! - Output buffers stay with the caller

use std::cell::RefCell;
use std::ffi::{c_char, CStr};
use std::panic::{self, AssertUnwindSafe};
use std::ptr;

use kcatalog::{
    CapabilitySet, Catalog, DeviceInfo, Evaluator, KernelQuery, ProblemShape, SelectError, SelectionPath,
};

thread_local! {
    static LAST_ERROR: RefCell<String> = RefCell::new(String::new());
}

// ============================================================================
// C ABI Types
// ============================================================================

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KcatStatus {
    Success = 0,
    InvalidParams = 1,
    InvalidCatalog = 2,
    InvalidQuery = 3,
    EmptyCatalog = 4,
    NoSelectorMatch = 5,
    NoEligibleEntry = 6,
    /// Selection succeeded but the strategy name was truncated.
    BufferTooSmall = 7,
    UnknownError = 99,
}

/// Opaque catalog handle.
pub struct KcatCatalog {
    catalog: Catalog,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct KcatQuery {
    /// Hardware code: 'C', 'E', 'F', 'G' or 'H'.
    pub hw: c_char,
    /// NUL-terminated kernel type; null matches any.
    pub kernel_type: *const c_char,
    /// Precision names or codes; null or "" is a wildcard.
    pub precisions: [*const c_char; 3],
    /// Layout codes; null or "" is a wildcard.
    pub layouts: [*const c_char; 3],
    pub m: u64,
    pub n: u64,
    pub k: u64,
    /// Batch dimensions (caller-owned, length = batch_rank)
    pub batch: *const u64,
    pub batch_rank: u32,
    /// Alignment of A, B, C in elements
    pub alignment: [u32; 3],
    pub stepping: u32,
    /// Capability bits, bit i = i-th `Capability` variant
    pub capabilities: u32,
    /// 0 selects the hardware default
    pub eu_count: u32,
    /// 0 selects the hardware default
    pub threads_per_eu: u32,
    pub beta: bool,
    pub post_ops: bool,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct KcatSelection {
    /// Position of the entry in catalog order
    pub index: u64,
    /// Model cost; NaN when chosen through an accept range, including an
    /// alignment-fallback entry's accept range (path 2)
    pub score: f64,
    /// 0 = accept range, 1 = scored, 2 = alignment fallback (scored or accepted)
    pub path: u32,
    pub unroll: [u32; 3],
    pub wg: [u32; 3],
    pub k_parallel: bool,
}

// ============================================================================
// Error Handling
// ============================================================================

fn set_last_error(msg: String) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = msg;
    });
}

fn fail(status: KcatStatus, msg: impl Into<String>) -> KcatStatus {
    set_last_error(msg.into());
    status
}

fn guarded<F>(name: &str, f: F) -> KcatStatus
where
    F: FnOnce() -> Result<(), KcatStatus>,
{
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(())) => KcatStatus::Success,
        Ok(Err(status)) => status,
        Err(_) => fail(KcatStatus::UnknownError, format!("Panic in {}", name)),
    }
}

/// Copies `s` into `buf` with a trailing NUL, truncating to `len - 1` bytes.
/// Returns the number of bytes copied.
///
/// # Safety
/// `buf` must be valid for `len` bytes and `len` must be non-zero.
unsafe fn copy_c_str(s: &str, buf: *mut u8, len: usize) -> usize {
    let bytes = s.as_bytes();
    let copy_len = bytes.len().min(len - 1);
    ptr::copy_nonoverlapping(bytes.as_ptr(), buf, copy_len);
    *buf.add(copy_len) = 0;
    copy_len
}

/// Get last error message
///
/// # Safety
/// `buf` must be a valid pointer to a buffer of at least `len` bytes
#[no_mangle]
pub unsafe extern "C" fn kcat_get_last_error(buf: *mut u8, len: usize) -> i32 {
    if buf.is_null() || len == 0 {
        return -1;
    }
    LAST_ERROR.with(|e| copy_c_str(&e.borrow(), buf, len) as i32)
}

/// Clear last error
#[no_mangle]
pub extern "C" fn kcat_clear_error() {
    LAST_ERROR.with(|e| {
        e.borrow_mut().clear();
    });
}

// ============================================================================
// Catalog
// ============================================================================

/// Builds a catalog from a JSON source table.
///
/// # Safety
/// `json` must be NUL-terminated; `out` must be valid for one pointer write.
#[no_mangle]
pub unsafe extern "C" fn kcat_catalog_from_json(json: *const c_char, out: *mut *mut KcatCatalog) -> KcatStatus {
    guarded("kcat_catalog_from_json", || {
        if json.is_null() || out.is_null() {
            return Err(fail(KcatStatus::InvalidParams, "Null pointer argument"));
        }
        let text = CStr::from_ptr(json)
            .to_str()
            .map_err(|_| fail(KcatStatus::InvalidParams, "Catalog JSON is not valid UTF-8"))?;
        let catalog = Catalog::from_json(text).map_err(|e| fail(KcatStatus::InvalidCatalog, e.to_string()))?;
        *out = Box::into_raw(Box::new(KcatCatalog { catalog }));
        Ok(())
    })
}

/// Releases a catalog. Null is ignored.
///
/// # Safety
/// `catalog` must come from `kcat_catalog_from_json` and not be used afterwards.
#[no_mangle]
pub unsafe extern "C" fn kcat_catalog_free(catalog: *mut KcatCatalog) {
    if !catalog.is_null() {
        drop(Box::from_raw(catalog));
    }
}

/// # Safety
/// `catalog` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn kcat_catalog_len(catalog: *const KcatCatalog) -> u64 {
    catalog.as_ref().map_or(0, |c| c.catalog.len() as u64)
}

// ============================================================================
// Selection
// ============================================================================

unsafe fn text<'a>(p: *const c_char) -> Result<&'a str, KcatStatus> {
    if p.is_null() {
        return Ok("");
    }
    CStr::from_ptr(p)
        .to_str()
        .map_err(|_| fail(KcatStatus::InvalidParams, "Query string is not valid UTF-8"))
}

unsafe fn build_query(q: &KcatQuery) -> Result<KernelQuery, KcatStatus> {
    let batch = match (q.batch_rank, q.batch.is_null()) {
        (0, _) => Vec::new(),
        (_, true) => return Err(fail(KcatStatus::InvalidParams, "Null batch array with non-zero rank")),
        (rank, false) => std::slice::from_raw_parts(q.batch, rank as usize).to_vec(),
    };
    let precisions = [text(q.precisions[0])?, text(q.precisions[1])?, text(q.precisions[2])?];
    let layouts = [text(q.layouts[0])?, text(q.layouts[1])?, text(q.layouts[2])?];
    let shape = ProblemShape::batched(q.m, q.n, q.k, batch);
    let query = KernelQuery::parse(char::from(q.hw as u8), text(q.kernel_type)?, precisions, layouts, shape)
        .map_err(|e| fail(KcatStatus::InvalidQuery, e.to_string()))?;
    let device = DeviceInfo {
        stepping: q.stepping,
        eu_count: (q.eu_count != 0).then_some(q.eu_count),
        threads_per_eu: (q.threads_per_eu != 0).then_some(q.threads_per_eu),
        capabilities: CapabilitySet::from_bits(q.capabilities),
    };
    Ok(query
        .with_alignment(q.alignment)
        .with_beta(q.beta)
        .with_post_ops(q.post_ops)
        .with_device(device))
}

fn status_of(err: &SelectError) -> KcatStatus {
    match err {
        SelectError::EmptyCatalog => KcatStatus::EmptyCatalog,
        SelectError::NoSelectorMatch { .. } => KcatStatus::NoSelectorMatch,
        SelectError::NoEligibleEntry { .. } => KcatStatus::NoEligibleEntry,
        SelectError::InvalidQuery(_) => KcatStatus::InvalidQuery,
    }
}

/// Selects a strategy for `query`.
///
/// On success `out` receives the driver metadata and, when `strategy` is
/// non-null, the strategy name is written there NUL-terminated.
///
/// # Safety
/// - `catalog`, `query` and `out` must be valid
/// - `strategy` may be null; otherwise it must hold `strategy_len` bytes
/// - `query` pointers must follow the `KcatQuery` field contracts
#[no_mangle]
pub unsafe extern "C" fn kcat_select(
    catalog: *const KcatCatalog,
    query: *const KcatQuery,
    out: *mut KcatSelection,
    strategy: *mut u8,
    strategy_len: usize,
) -> KcatStatus {
    guarded("kcat_select", || {
        let (Some(handle), Some(q)) = (catalog.as_ref(), query.as_ref()) else {
            return Err(fail(KcatStatus::InvalidParams, "Null catalog or query"));
        };
        if out.is_null() {
            return Err(fail(KcatStatus::InvalidParams, "Null output selection"));
        }
        let query = build_query(q)?;
        let selection = Evaluator::new(&handle.catalog)
            .select(&query)
            .map_err(|e| fail(status_of(&e), e.to_string()))?;

        let driver = selection.driver_info();
        *out = KcatSelection {
            index: selection.index as u64,
            score: selection.score.unwrap_or(f64::NAN),
            path: match selection.path {
                SelectionPath::AcceptRange => 0,
                SelectionPath::Scored => 1,
                SelectionPath::AlignFallback => 2,
            },
            unroll: driver.unroll,
            wg: driver.wg,
            k_parallel: driver.k_parallel,
        };

        if !strategy.is_null() && strategy_len > 0 {
            let name = selection.strategy();
            if copy_c_str(name, strategy, strategy_len) < name.len() {
                return Err(fail(
                    KcatStatus::BufferTooSmall,
                    format!("Strategy name needs {} bytes", name.len() + 1),
                ));
            }
        }
        Ok(())
    })
}

// ============================================================================
// Version Info
// ============================================================================

fn version_part(index: usize) -> u32 {
    kcatalog::VERSION
        .split('.')
        .nth(index)
        .and_then(|p| p.parse().ok())
        .unwrap_or(0)
}

#[no_mangle]
pub extern "C" fn kcat_version_major() -> u32 {
    version_part(0)
}

#[no_mangle]
pub extern "C" fn kcat_version_minor() -> u32 {
    version_part(1)
}

#[no_mangle]
pub extern "C" fn kcat_version_patch() -> u32 {
    version_part(2)
}
