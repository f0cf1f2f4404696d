use std::fmt;

use serde::{Deserialize, Serialize};

/// Hardware/runtime capability a catalog entry may require or forbid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Block2dA,
    Block2dB,
    Block2dC,
    Addr64A,
    Addr64B,
    Addr64C,
    Batch,
    BatchMultiDim,
    SumA,
    SumB,
    AbOffset,
    OffsetMultiDim,
    Systolic,
    Integrated,
    BatchN,
    Custom1,
    Xe2Block2d,
}

impl Capability {
    pub const ALL: &'static [Capability] = &[
        Capability::Block2dA,
        Capability::Block2dB,
        Capability::Block2dC,
        Capability::Addr64A,
        Capability::Addr64B,
        Capability::Addr64C,
        Capability::Batch,
        Capability::BatchMultiDim,
        Capability::SumA,
        Capability::SumB,
        Capability::AbOffset,
        Capability::OffsetMultiDim,
        Capability::Systolic,
        Capability::Integrated,
        Capability::BatchN,
        Capability::Custom1,
        Capability::Xe2Block2d,
    ];

    /// Upper-case tag character; the lower-case form forbids the capability.
    pub fn tag(self) -> char {
        match self {
            Self::Block2dA => 'A',
            Self::Block2dB => 'B',
            Self::Block2dC => 'C',
            Self::Addr64A => 'X',
            Self::Addr64B => 'Y',
            Self::Addr64C => 'Z',
            Self::Batch => 'V',
            Self::BatchMultiDim => 'W',
            Self::SumA => 'Q',
            Self::SumB => 'P',
            Self::AbOffset => 'R',
            Self::OffsetMultiDim => 'O',
            Self::Systolic => 'I',
            Self::Integrated => 'H',
            Self::BatchN => 'N',
            Self::Custom1 => 'D',
            Self::Xe2Block2d => 'G',
        }
    }

    pub fn from_tag(tag: char) -> Option<Self> {
        let upper = tag.to_ascii_uppercase();
        Self::ALL.iter().copied().find(|c| c.tag() == upper)
    }

    fn bit(self) -> u32 {
        1 << (self as u32)
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Block2dA => "2D block access (A)",
            Self::Block2dB => "2D block access (B)",
            Self::Block2dC => "2D block access (C)",
            Self::Addr64A => "64-bit addressing (A)",
            Self::Addr64B => "64-bit addressing (B)",
            Self::Addr64C => "64-bit addressing (C)",
            Self::Batch => "batching",
            Self::BatchMultiDim => "multi-dimensional batching",
            Self::SumA => "A sums",
            Self::SumB => "B sums",
            Self::AbOffset => "A/B offsets",
            Self::OffsetMultiDim => "multi-dimensional offsets",
            Self::Systolic => "systolic array",
            Self::Integrated => "integrated GPU",
            Self::BatchN => "batch in N",
            Self::Custom1 => "custom 1",
            Self::Xe2Block2d => "Xe2 2D block",
        };
        write!(f, "{}", name)
    }
}

/// Set of capabilities available to a query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Vec<Capability>", into = "Vec<Capability>")]
pub struct CapabilitySet(u32);

impl CapabilitySet {
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Unknown bits are dropped.
    pub fn from_bits(bits: u32) -> Self {
        let known = Capability::ALL.iter().fold(0, |acc, c| acc | c.bit());
        Self(bits & known)
    }

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn contains(self, cap: Capability) -> bool {
        self.0 & cap.bit() != 0
    }

    pub fn insert(&mut self, cap: Capability) {
        self.0 |= cap.bit();
    }

    pub fn remove(&mut self, cap: Capability) {
        self.0 &= !cap.bit();
    }

    pub fn with(mut self, cap: Capability) -> Self {
        self.insert(cap);
        self
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn iter(self) -> impl Iterator<Item = Capability> {
        Capability::ALL.iter().copied().filter(move |c| self.contains(*c))
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        iter.into_iter().fold(Self::empty(), Self::with)
    }
}

impl From<Vec<Capability>> for CapabilitySet {
    fn from(caps: Vec<Capability>) -> Self {
        caps.into_iter().collect()
    }
}

impl From<CapabilitySet> for Vec<Capability> {
    fn from(set: CapabilitySet) -> Self {
        set.iter().collect()
    }
}
