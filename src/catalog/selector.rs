use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::QueryError;

/// Hardware generation a catalog entry was authored for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "char", into = "char")]
pub enum HwTag {
    Gen12Lp,
    XeHpg,
    XeHpc,
    Xe2,
    Xe3,
}

impl HwTag {
    pub const ALL: &'static [HwTag] = &[
        HwTag::Gen12Lp,
        HwTag::XeHpg,
        HwTag::XeHpc,
        HwTag::Xe2,
        HwTag::Xe3,
    ];

    pub fn code(self) -> char {
        match self {
            Self::Gen12Lp => 'C',
            Self::XeHpg => 'E',
            Self::XeHpc => 'F',
            Self::Xe2 => 'G',
            Self::Xe3 => 'H',
        }
    }

    pub fn from_code(code: char) -> Option<Self> {
        Self::ALL.iter().copied().find(|hw| hw.code() == code)
    }

    /// EU count assumed when the caller does not report one.
    pub fn default_eu_count(self) -> u32 {
        match self {
            Self::Gen12Lp => 96,
            Self::XeHpg => 512,
            Self::XeHpc => 448,
            Self::Xe2 => 160,
            Self::Xe3 => 192,
        }
    }

    pub fn default_threads_per_eu(self) -> u32 {
        match self {
            Self::Gen12Lp => 7,
            _ => 8,
        }
    }
}

impl TryFrom<char> for HwTag {
    type Error = QueryError;

    fn try_from(code: char) -> Result<Self, Self::Error> {
        Self::from_code(code).ok_or(QueryError::UnknownHardware(code))
    }
}

impl From<HwTag> for char {
    fn from(hw: HwTag) -> char {
        hw.code()
    }
}

impl fmt::Display for HwTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Gen12Lp => "Gen12LP",
            Self::XeHpg => "XeHPG",
            Self::XeHpc => "XeHPC",
            Self::Xe2 => "Xe2",
            Self::Xe3 => "Xe3",
        };
        write!(f, "{}", name)
    }
}

/// Numeric precision of one GEMM operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Precision {
    F64,
    F32,
    Tf32,
    F16,
    Bf16,
    Bf8,
    Hf8,
    S32,
    S8,
    U8,
    S4,
    U4,
}

impl Precision {
    pub const ALL: &'static [Precision] = &[
        Precision::F64,
        Precision::F32,
        Precision::Tf32,
        Precision::F16,
        Precision::Bf16,
        Precision::Bf8,
        Precision::Hf8,
        Precision::S32,
        Precision::S8,
        Precision::U8,
        Precision::S4,
        Precision::U4,
    ];

    /// Single-character code used by existing catalog tables.
    pub fn code(self) -> char {
        match self {
            Self::F64 => 'D',
            Self::F32 => 'S',
            Self::Tf32 => 'T',
            Self::F16 => 'H',
            Self::Bf16 => 'B',
            Self::Bf8 => 'Q',
            Self::Hf8 => 'q',
            Self::S32 => 'I',
            Self::S8 => 'O',
            Self::U8 => 'o',
            Self::S4 => 'F',
            Self::U4 => 'f',
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::F64 => "f64",
            Self::F32 => "f32",
            Self::Tf32 => "tf32",
            Self::F16 => "f16",
            Self::Bf16 => "bf16",
            Self::Bf8 => "bf8",
            Self::Hf8 => "hf8",
            Self::S32 => "s32",
            Self::S8 => "s8",
            Self::U8 => "u8",
            Self::S4 => "s4",
            Self::U4 => "u4",
        }
    }

    /// Accepts either the name (`"f32"`) or the legacy code (`"S"`).
    pub fn parse(tag: &str) -> Option<Self> {
        let mut chars = tag.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            return Self::ALL.iter().copied().find(|p| p.code() == c);
        }
        Self::ALL.iter().copied().find(|p| p.name() == tag)
    }

    /// Ordering byte: the code with its case bit (and everything above) masked off,
    /// so signed/unsigned pairs share a catalog range.
    pub fn order_byte(self) -> u8 {
        (self.code() as u8) & 0x1F
    }
}

impl TryFrom<String> for Precision {
    type Error = QueryError;

    fn try_from(tag: String) -> Result<Self, Self::Error> {
        Self::parse(&tag).ok_or(QueryError::UnknownPrecision(tag))
    }
}

impl From<Precision> for String {
    fn from(p: Precision) -> String {
        p.name().to_string()
    }
}

/// Memory layout of one GEMM operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Layout {
    /// Column-major.
    N,
    /// Row-major.
    T,
    PackedA,
    PackedB,
}

impl Layout {
    pub const ALL: &'static [Layout] = &[Layout::N, Layout::T, Layout::PackedA, Layout::PackedB];

    pub fn code(self) -> char {
        match self {
            Self::N => 'N',
            Self::T => 'T',
            Self::PackedA => 'A',
            Self::PackedB => 'B',
        }
    }

    pub fn parse(tag: &str) -> Option<Self> {
        let mut chars = tag.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Self::ALL.iter().copied().find(|l| l.code() == c),
            _ => None,
        }
    }
}

impl TryFrom<String> for Layout {
    type Error = QueryError;

    fn try_from(tag: String) -> Result<Self, Self::Error> {
        Self::parse(&tag).ok_or(QueryError::UnknownLayout(tag))
    }
}

impl From<Layout> for String {
    fn from(l: Layout) -> String {
        l.code().to_string()
    }
}

/// Coarse ordering key of a selector.
///
/// Byte order: hardware code, precision A, precision B, layout A, layout B.
/// Kernel type and the third precision/layout slot are deliberately absent, so
/// entries that differ only in those share a catalog range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SelectorKey(pub [u8; 5]);

/// Identifies which problems a catalog entry was authored for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Selector {
    pub hw: HwTag,
    pub kernel_type: String,
    pub precisions: [Option<Precision>; 3],
    pub layouts: [Option<Layout>; 3],
}

impl Selector {
    pub fn new(
        hw: HwTag,
        kernel_type: impl Into<String>,
        precisions: [Option<Precision>; 3],
        layouts: [Option<Layout>; 3],
    ) -> Self {
        Self {
            hw,
            kernel_type: kernel_type.into(),
            precisions,
            layouts,
        }
    }

    /// Builds a selector from the textual vocabulary. Empty slots are wildcards.
    pub fn parse(
        hw: char,
        kernel_type: &str,
        precisions: [&str; 3],
        layouts: [&str; 3],
    ) -> Result<Self, QueryError> {
        let hw = HwTag::try_from(hw)?;
        let mut p = [None; 3];
        for (slot, tag) in p.iter_mut().zip(precisions) {
            if !tag.is_empty() {
                *slot = Some(Precision::parse(tag).ok_or_else(|| QueryError::UnknownPrecision(tag.to_string()))?);
            }
        }
        let mut l = [None; 3];
        for (slot, tag) in l.iter_mut().zip(layouts) {
            if !tag.is_empty() {
                *slot = Some(Layout::parse(tag).ok_or_else(|| QueryError::UnknownLayout(tag.to_string()))?);
            }
        }
        Ok(Self::new(hw, kernel_type, p, l))
    }

    /// Full ordering key. Wildcard slots map to zero.
    pub fn key(&self) -> SelectorKey {
        let (bytes, _) = self.key_prefix();
        SelectorKey(bytes)
    }

    /// Key bytes plus the number of leading bytes that are known, i.e. up to the
    /// first wildcard slot.
    pub fn key_prefix(&self) -> ([u8; 5], usize) {
        let fields = [
            Some(self.hw.code() as u8),
            self.precisions[0].map(Precision::order_byte),
            self.precisions[1].map(Precision::order_byte),
            self.layouts[0].map(|l| l.code() as u8),
            self.layouts[1].map(|l| l.code() as u8),
        ];
        let mut bytes = [0u8; 5];
        let mut known = fields.len();
        for (i, field) in fields.iter().enumerate() {
            match field {
                Some(b) => bytes[i] = *b,
                None => {
                    if known == fields.len() {
                        known = i;
                    }
                }
            }
        }
        (bytes, known)
    }

    /// Whether this (catalog) selector serves `query` on the fields the
    /// ordering key does not discriminate. Unspecified slots on either side match.
    pub fn admits(&self, query: &Selector) -> bool {
        if self.hw != query.hw {
            return false;
        }
        if !query.kernel_type.is_empty() && self.kernel_type != query.kernel_type {
            return false;
        }
        fn slot_ok<T: PartialEq>(a: Option<T>, b: Option<T>) -> bool {
            match (a, b) {
                (Some(x), Some(y)) => x == y,
                _ => true,
            }
        }
        self.precisions
            .iter()
            .zip(query.precisions.iter())
            .all(|(a, b)| slot_ok(*a, *b))
            && self
                .layouts
                .iter()
                .zip(query.layouts.iter())
                .all(|(a, b)| slot_ok(*a, *b))
    }

    /// Compact text form, e.g. `F gemm SSS NN@4N`.
    pub fn describe(&self, alignment: &[u32; 3]) -> String {
        let mut out = String::new();
        out.push(self.hw.code());
        out.push(' ');
        out.push_str(&self.kernel_type);
        out.push(' ');
        for p in self.precisions.iter().flatten() {
            out.push(p.code());
        }
        out.push(' ');
        for (layout, align) in self.layouts.iter().zip(alignment) {
            if let Some(l) = layout {
                out.push(l.code());
            }
            if *align != 1 {
                out.push('@');
                out.push_str(&align.to_string());
            }
        }
        out
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.describe(&[1, 1, 1]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precision_parse_accepts_names_and_codes() {
        assert_eq!(Precision::parse("f32"), Some(Precision::F32));
        assert_eq!(Precision::parse("S"), Some(Precision::F32));
        assert_eq!(Precision::parse("o"), Some(Precision::U8));
        assert_eq!(Precision::parse("f31"), None);
        assert_eq!(Precision::parse("x"), None);
    }

    #[test]
    fn test_signedness_shares_order_byte() {
        assert_eq!(Precision::S8.order_byte(), Precision::U8.order_byte());
        assert_eq!(Precision::Bf8.order_byte(), Precision::Hf8.order_byte());
        assert_ne!(Precision::F32.order_byte(), Precision::F16.order_byte());
    }

    #[test]
    fn test_key_prefix_stops_at_first_wildcard() {
        let sel = Selector::parse('F', "gemm", ["f32", "", "f32"], ["N", "N", ""]).unwrap();
        let (_, known) = sel.key_prefix();
        assert_eq!(known, 2);

        let full = Selector::parse('F', "gemm", ["f32", "f32", ""], ["N", "T", ""]).unwrap();
        assert_eq!(full.key_prefix().1, 5);
    }

    #[test]
    fn test_admits_checks_omitted_fields() {
        let entry = Selector::parse('F', "gemm", ["s8", "s8", "s32"], ["N", "N", "N"]).unwrap();
        let q = Selector::parse('F', "gemm", ["u8", "s8", ""], ["N", "N", ""]).unwrap();
        assert_eq!(entry.key().0[..3], q.key().0[..3]);
        assert!(!entry.admits(&q));

        let q = Selector::parse('F', "", ["s8", "s8", ""], ["N", "N", "T"]).unwrap();
        assert!(!entry.admits(&q));

        let q = Selector::parse('F', "", ["s8", "s8", ""], ["N", "N", ""]).unwrap();
        assert!(entry.admits(&q));
    }

    #[test]
    fn test_admits_compares_layout_slots() {
        let entry = Selector::parse('F', "gemm", ["f32", "f32", "f32"], ["N", "T", "N"]).unwrap();
        let q = Selector::parse('F', "gemm", ["", "", ""], ["N", "N", ""]).unwrap();
        assert!(!entry.admits(&q));

        let q = Selector::parse('F', "gemm", ["", "", ""], ["N", "T", ""]).unwrap();
        assert!(entry.admits(&q));

        let packed = Selector::parse('F', "gemm", ["f32", "f32", "f32"], ["A", "B", "N"]).unwrap();
        let q = Selector::parse('F', "gemm", ["f32", "", ""], ["A", "B", "T"]).unwrap();
        assert!(!packed.admits(&q));
    }

    #[test]
    fn test_describe_includes_alignment() {
        let sel = Selector::parse('G', "gemm", ["f16", "f16", "f32"], ["N", "T", "N"]).unwrap();
        assert_eq!(sel.describe(&[1, 4, 1]), "G gemm HHS NT@4N");
    }
}
