//! Target data layout.
//!
//! A [`DataLayout`] describes endianness, pointer sizes, type alignments, native
//! integer widths and symbol mangling of a target. It is always in a fully parsed
//! state: the only ways to obtain one are [`DataLayout::default`] (the
//! "unspecified" layout) and [`DataLayout::parse`].
//!
//! The descriptor is a `-`-separated list of specifications:
//!
//! | Spec | Meaning |
//! |------|---------|
//! | `e` / `E` | little / big endian |
//! | `S<bits>` | natural stack alignment |
//! | `P<as>` / `A<as>` / `G<as>` | program / alloca / globals address space |
//! | `p[<as>]:<size>:<abi>[:<pref>[:<idx>]]` | pointer size and alignment |
//! | `i<size>:<abi>[:<pref>]` | integer alignment (`f` floats, `v` vectors) |
//! | `a:<abi>[:<pref>]` | aggregate alignment |
//! | `m:<c>` | mangling style |
//! | `n<w>[:<w>]*` | native integer widths |
//!
//! All sizes and alignments are expressed in bits.
use std::{collections::BTreeMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use strum::{Display, EnumIs};

use crate::utils::error::{Error, HyResult};

pub mod parser;

#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIs, Serialize, Deserialize,
)]
pub enum Endianness {
    #[default]
    #[strum(serialize = "e")]
    Little,
    #[strum(serialize = "E")]
    Big,
}

/// Symbol mangling style of the target object format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
pub enum Mangling {
    #[strum(serialize = "e")]
    Elf,
    #[strum(serialize = "l")]
    Goff,
    #[strum(serialize = "o")]
    MachO,
    #[strum(serialize = "m")]
    Mips,
    #[strum(serialize = "w")]
    WinCoff,
    #[strum(serialize = "x")]
    WinCoffX86,
    #[strum(serialize = "a")]
    XCoff,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, Serialize, Deserialize,
)]
pub enum AlignKind {
    #[strum(serialize = "i")]
    Integer,
    #[strum(serialize = "f")]
    Float,
    #[strum(serialize = "v")]
    Vector,
}

/// Alignment of scalar types of one kind and bit width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AlignSpec {
    pub kind: AlignKind,
    pub bit_width: u32,
    pub abi_align: u32,
    pub pref_align: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PointerSpec {
    pub address_space: u32,
    pub size: u32,
    pub abi_align: u32,
    pub pref_align: u32,
    /// Width of the integer used for address computations.
    pub index_size: u32,
}

impl PointerSpec {
    /// Pointer description used for address spaces the layout does not mention.
    pub const DEFAULT: PointerSpec = PointerSpec {
        address_space: 0,
        size: 64,
        abi_align: 64,
        pref_align: 64,
        index_size: 64,
    };
}

/// A single parsed specification of a layout descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayoutSpec {
    Endianness(Endianness),
    StackAlign(u32),
    ProgramAddressSpace(u32),
    AllocaAddressSpace(u32),
    GlobalsAddressSpace(u32),
    Pointer(PointerSpec),
    Align(AlignSpec),
    Aggregate { abi_align: u32, pref_align: u32 },
    Mangling(Mangling),
    NativeIntegers(Vec<u32>),
}

/// Parsed, value-comparable target description.
///
/// ```rust
/// # use hyir::layout::{DataLayout, Endianness};
/// let dl = DataLayout::parse("E-p:32:32-i64:64-n8:16:32").unwrap();
/// assert_eq!(dl.endianness(), Endianness::Big);
/// assert_eq!(dl.pointer_size_in_bits(0), 32);
/// assert!(dl.is_legal_integer(16));
/// assert_eq!(DataLayout::parse(&dl.to_string()).unwrap(), dl);
/// ```
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DataLayout {
    endianness: Endianness,
    stack_natural_align: Option<u32>,
    program_address_space: u32,
    alloca_address_space: u32,
    globals_address_space: u32,
    mangling: Option<Mangling>,
    aggregate_align: Option<(u32, u32)>,
    pointers: BTreeMap<u32, PointerSpec>,
    alignments: BTreeMap<(AlignKind, u32), AlignSpec>,
    legal_int_widths: SmallVec<u32, 4>,
}

impl DataLayout {
    /// Largest power of two number of bytes, in bits, representable in `u32`.
    pub const MAX_NATURAL_ALIGN: u32 = 1 << 31;

    /// Parse a layout descriptor. The empty descriptor yields the unspecified layout.
    pub fn parse(descriptor: &str) -> HyResult<Self> {
        let specs = parser::parse_specs(descriptor).map_err(|errors| Error::LayoutParse {
            descriptor: descriptor.to_string(),
            errors,
        })?;
        Ok(Self::from_specs(specs))
    }

    /// Build a layout from already validated specifications. Later specifications
    /// override earlier ones describing the same property.
    pub fn from_specs(specs: impl IntoIterator<Item = LayoutSpec>) -> Self {
        let mut layout = Self::default();
        for spec in specs {
            match spec {
                LayoutSpec::Endianness(endianness) => layout.endianness = endianness,
                LayoutSpec::StackAlign(align) => layout.stack_natural_align = Some(align),
                LayoutSpec::ProgramAddressSpace(space) => layout.program_address_space = space,
                LayoutSpec::AllocaAddressSpace(space) => layout.alloca_address_space = space,
                LayoutSpec::GlobalsAddressSpace(space) => layout.globals_address_space = space,
                LayoutSpec::Pointer(pointer) => {
                    layout.pointers.insert(pointer.address_space, pointer);
                }
                LayoutSpec::Align(align) => {
                    layout.alignments.insert((align.kind, align.bit_width), align);
                }
                LayoutSpec::Aggregate {
                    abi_align,
                    pref_align,
                } => layout.aggregate_align = Some((abi_align, pref_align)),
                LayoutSpec::Mangling(mangling) => layout.mangling = Some(mangling),
                LayoutSpec::NativeIntegers(widths) => {
                    layout.legal_int_widths = widths.into_iter().collect();
                }
            }
        }
        layout
    }

    /// Whether this layout carries no target information at all.
    pub fn is_unspecified(&self) -> bool {
        *self == Self::default()
    }

    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    pub fn is_little_endian(&self) -> bool {
        self.endianness.is_little()
    }

    pub fn is_big_endian(&self) -> bool {
        self.endianness.is_big()
    }

    pub fn stack_natural_align(&self) -> Option<u32> {
        self.stack_natural_align
    }

    pub fn program_address_space(&self) -> u32 {
        self.program_address_space
    }

    pub fn alloca_address_space(&self) -> u32 {
        self.alloca_address_space
    }

    pub fn globals_address_space(&self) -> u32 {
        self.globals_address_space
    }

    pub fn mangling(&self) -> Option<Mangling> {
        self.mangling
    }

    /// ABI and preferred alignment of aggregates, `(0, 64)` when unspecified.
    pub fn aggregate_align(&self) -> (u32, u32) {
        self.aggregate_align.unwrap_or((0, 64))
    }

    /// Pointer description for `address_space`. Falls back on address space 0,
    /// then on [`PointerSpec::DEFAULT`].
    pub fn pointer_spec(&self, address_space: u32) -> PointerSpec {
        let base = self
            .pointers
            .get(&address_space)
            .or_else(|| self.pointers.get(&0))
            .copied()
            .unwrap_or(PointerSpec::DEFAULT);
        PointerSpec {
            address_space,
            ..base
        }
    }

    pub fn pointer_size_in_bits(&self, address_space: u32) -> u32 {
        self.pointer_spec(address_space).size
    }

    /// Explicitly specified pointer descriptions, ordered by address space.
    pub fn pointer_specs(&self) -> impl Iterator<Item = &PointerSpec> {
        self.pointers.values()
    }

    /// Explicitly specified alignment for `kind` and `bit_width`.
    pub fn alignment(&self, kind: AlignKind, bit_width: u32) -> Option<AlignSpec> {
        self.alignments.get(&(kind, bit_width)).copied()
    }

    /// Explicitly specified alignments, ordered by kind then width.
    pub fn alignment_specs(&self) -> impl Iterator<Item = &AlignSpec> {
        self.alignments.values()
    }

    /// ABI alignment of an integer of `bit_width` bits.
    ///
    /// Uses the exact specification when present, otherwise the smallest wider
    /// integer specification, otherwise the natural alignment of the width. Widths
    /// whose natural alignment does not fit in `u32` get the alignment of the
    /// widest integer specification, or `MAX_NATURAL_ALIGN` without one.
    pub fn int_abi_align(&self, bit_width: u32) -> u32 {
        if let Some(spec) = self.alignment(AlignKind::Integer, bit_width) {
            return spec.abi_align;
        }

        let integers = self
            .alignments
            .range((AlignKind::Integer, 0)..(AlignKind::Float, 0));
        if let Some((_, spec)) = integers
            .clone()
            .find(|((_, width), _)| *width >= bit_width)
        {
            return spec.abi_align;
        }

        bit_width
            .max(8)
            .div_ceil(8)
            .checked_next_power_of_two()
            .and_then(|bytes| bytes.checked_mul(8))
            .or_else(|| integers.last().map(|(_, spec)| spec.abi_align))
            .unwrap_or(Self::MAX_NATURAL_ALIGN)
    }

    /// Native integer widths of the target.
    pub fn legal_int_widths(&self) -> &[u32] {
        &self.legal_int_widths
    }

    pub fn is_legal_integer(&self, bit_width: u32) -> bool {
        self.legal_int_widths.contains(&bit_width)
    }

    /// Specifications that reproduce this layout, in canonical order.
    pub fn specs(&self) -> Vec<LayoutSpec> {
        let mut specs = Vec::new();
        if self.endianness.is_big() {
            specs.push(LayoutSpec::Endianness(self.endianness));
        }
        if let Some(mangling) = self.mangling {
            specs.push(LayoutSpec::Mangling(mangling));
        }
        if self.program_address_space != 0 {
            specs.push(LayoutSpec::ProgramAddressSpace(self.program_address_space));
        }
        if self.alloca_address_space != 0 {
            specs.push(LayoutSpec::AllocaAddressSpace(self.alloca_address_space));
        }
        if self.globals_address_space != 0 {
            specs.push(LayoutSpec::GlobalsAddressSpace(self.globals_address_space));
        }
        specs.extend(self.pointers.values().copied().map(LayoutSpec::Pointer));
        specs.extend(self.alignments.values().copied().map(LayoutSpec::Align));
        if let Some((abi_align, pref_align)) = self.aggregate_align {
            specs.push(LayoutSpec::Aggregate {
                abi_align,
                pref_align,
            });
        }
        if !self.legal_int_widths.is_empty() {
            specs.push(LayoutSpec::NativeIntegers(self.legal_int_widths.to_vec()));
        }
        if let Some(align) = self.stack_natural_align {
            specs.push(LayoutSpec::StackAlign(align));
        }
        specs
    }
}

impl fmt::Display for LayoutSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayoutSpec::Endianness(endianness) => write!(f, "{}", endianness),
            LayoutSpec::StackAlign(align) => write!(f, "S{}", align),
            LayoutSpec::ProgramAddressSpace(space) => write!(f, "P{}", space),
            LayoutSpec::AllocaAddressSpace(space) => write!(f, "A{}", space),
            LayoutSpec::GlobalsAddressSpace(space) => write!(f, "G{}", space),
            LayoutSpec::Pointer(p) => {
                write!(f, "p")?;
                if p.address_space != 0 {
                    write!(f, "{}", p.address_space)?;
                }
                write!(f, ":{}:{}", p.size, p.abi_align)?;
                if p.pref_align != p.abi_align || p.index_size != p.size {
                    write!(f, ":{}", p.pref_align)?;
                }
                if p.index_size != p.size {
                    write!(f, ":{}", p.index_size)?;
                }
                Ok(())
            }
            LayoutSpec::Align(a) => {
                write!(f, "{}{}:{}", a.kind, a.bit_width, a.abi_align)?;
                if a.pref_align != a.abi_align {
                    write!(f, ":{}", a.pref_align)?;
                }
                Ok(())
            }
            LayoutSpec::Aggregate {
                abi_align,
                pref_align,
            } => {
                write!(f, "a:{}", abi_align)?;
                if pref_align != abi_align {
                    write!(f, ":{}", pref_align)?;
                }
                Ok(())
            }
            LayoutSpec::Mangling(mangling) => write!(f, "m:{}", mangling),
            LayoutSpec::NativeIntegers(widths) => {
                write!(f, "n")?;
                for (i, width) in widths.iter().enumerate() {
                    if i > 0 {
                        write!(f, ":")?;
                    }
                    write!(f, "{}", width)?;
                }
                Ok(())
            }
        }
    }
}

/// Canonical descriptor. Parsing it back yields an equal layout.
impl fmt::Display for DataLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, spec) in self.specs().iter().enumerate() {
            if i > 0 {
                write!(f, "-")?;
            }
            write!(f, "{}", spec)?;
        }
        Ok(())
    }
}

impl FromStr for DataLayout {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for DataLayout {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<DataLayout> for String {
    fn from(value: DataLayout) -> Self {
        value.to_string()
    }
}
