use chumsky::{prelude::*, span::SimpleSpan, text::digits};

use crate::layout::{AlignKind, AlignSpec, Endianness, LayoutSpec, Mangling, PointerSpec};

type ParserExtra<'src> = extra::Err<Rich<'src, char>>;

fn number_parser<'src>() -> impl Parser<'src, &'src str, u32, ParserExtra<'src>> + Clone {
    digits(10)
        .to_slice()
        .try_map(|digits: &str, span| {
            digits
                .parse::<u32>()
                .map_err(|_| Rich::custom(span, format!("number out of range: {}", digits)))
        })
        .labelled("number")
}

/// An alignment in bits: a power of two number of bytes. `allow_zero` accepts 0
/// (meaning "no constraint") where the grammar permits it.
fn align_parser<'src>(
    allow_zero: bool,
) -> impl Parser<'src, &'src str, u32, ParserExtra<'src>> + Clone {
    number_parser()
        .try_map(move |bits, span| {
            if bits == 0 {
                if allow_zero {
                    return Ok(0);
                }
                return Err(Rich::custom(span, "alignment must be non-zero"));
            }
            if bits % 8 != 0 || !(bits / 8).is_power_of_two() {
                return Err(Rich::custom(
                    span,
                    format!("alignment must be a power of two number of bytes, got {} bits", bits),
                ));
            }
            Ok(bits)
        })
        .labelled("alignment")
}

fn width_parser<'src>() -> impl Parser<'src, &'src str, u32, ParserExtra<'src>> + Clone {
    number_parser()
        .try_map(|bits, span| {
            if bits == 0 {
                Err(Rich::custom(span, "size must be non-zero"))
            } else {
                Ok(bits)
            }
        })
        .labelled("size")
}

fn checked_pref<'src>(
    abi: u32,
    pref: Option<u32>,
    span: SimpleSpan,
) -> Result<u32, Rich<'src, char>> {
    let pref = pref.unwrap_or(abi);
    if pref < abi {
        return Err(Rich::custom(
            span,
            format!("preferred alignment {} is smaller than ABI alignment {}", pref, abi),
        ));
    }
    Ok(pref)
}

fn pointer_parser<'src>() -> impl Parser<'src, &'src str, LayoutSpec, ParserExtra<'src>> + Clone {
    just('p')
        .ignore_then(number_parser().or_not())
        .then_ignore(just(':'))
        .then(width_parser())
        .then_ignore(just(':'))
        .then(align_parser(false))
        .then(just(':').ignore_then(align_parser(false)).or_not())
        .then(just(':').ignore_then(width_parser()).or_not())
        .try_map(|((((address_space, size), abi_align), pref), index), span| {
            let pref_align = checked_pref(abi_align, pref, span)?;
            let index_size = index.unwrap_or(size);
            if index_size > size {
                return Err(Rich::custom(
                    span,
                    format!("index size {} exceeds pointer size {}", index_size, size),
                ));
            }
            Ok(LayoutSpec::Pointer(PointerSpec {
                address_space: address_space.unwrap_or(0),
                size,
                abi_align,
                pref_align,
                index_size,
            }))
        })
        .labelled("pointer specification")
}

fn scalar_align_parser<'src>()
-> impl Parser<'src, &'src str, LayoutSpec, ParserExtra<'src>> + Clone {
    choice((
        just('i').to(AlignKind::Integer),
        just('f').to(AlignKind::Float),
        just('v').to(AlignKind::Vector),
    ))
    .then(width_parser())
    .then_ignore(just(':'))
    .then(align_parser(false))
    .then(just(':').ignore_then(align_parser(false)).or_not())
    .try_map(|(((kind, bit_width), abi_align), pref), span| {
        let pref_align = checked_pref(abi_align, pref, span)?;
        if kind == AlignKind::Integer && bit_width == 8 && abi_align != 8 {
            return Err(Rich::custom(span, "i8 must be 8-bit aligned"));
        }
        Ok(LayoutSpec::Align(AlignSpec {
            kind,
            bit_width,
            abi_align,
            pref_align,
        }))
    })
    .labelled("alignment specification")
}

fn aggregate_parser<'src>() -> impl Parser<'src, &'src str, LayoutSpec, ParserExtra<'src>> + Clone
{
    just('a')
        .ignore_then(number_parser().or_not())
        .then_ignore(just(':'))
        .then(align_parser(true))
        .then(just(':').ignore_then(align_parser(false)).or_not())
        .try_map(|((size, abi_align), pref), span| {
            if size.is_some_and(|size| size != 0) {
                return Err(Rich::custom(span, "aggregate specification takes no size"));
            }
            let pref_align = checked_pref(abi_align, pref, span)?;
            Ok(LayoutSpec::Aggregate {
                abi_align,
                pref_align,
            })
        })
        .labelled("aggregate specification")
}

fn mangling_parser<'src>() -> impl Parser<'src, &'src str, LayoutSpec, ParserExtra<'src>> + Clone
{
    just("m:")
        .ignore_then(choice((
            just('e').to(Mangling::Elf),
            just('l').to(Mangling::Goff),
            just('o').to(Mangling::MachO),
            just('m').to(Mangling::Mips),
            just('w').to(Mangling::WinCoff),
            just('x').to(Mangling::WinCoffX86),
            just('a').to(Mangling::XCoff),
        )))
        .map(LayoutSpec::Mangling)
        .labelled("mangling specification")
}

fn native_integers_parser<'src>()
-> impl Parser<'src, &'src str, LayoutSpec, ParserExtra<'src>> + Clone {
    just('n')
        .ignore_then(
            width_parser()
                .separated_by(just(':'))
                .at_least(1)
                .collect::<Vec<_>>(),
        )
        .map(LayoutSpec::NativeIntegers)
        .labelled("native integer widths")
}

pub fn spec_parser<'src>() -> impl Parser<'src, &'src str, LayoutSpec, ParserExtra<'src>> + Clone {
    choice((
        just('e').to(LayoutSpec::Endianness(Endianness::Little)),
        just('E').to(LayoutSpec::Endianness(Endianness::Big)),
        just('S')
            .ignore_then(align_parser(true))
            .map(LayoutSpec::StackAlign),
        just('P')
            .ignore_then(number_parser())
            .map(LayoutSpec::ProgramAddressSpace),
        just('A')
            .ignore_then(number_parser())
            .map(LayoutSpec::AllocaAddressSpace),
        just('G')
            .ignore_then(number_parser())
            .map(LayoutSpec::GlobalsAddressSpace),
        pointer_parser(),
        scalar_align_parser(),
        aggregate_parser(),
        mangling_parser(),
        native_integers_parser(),
    ))
    .labelled("layout specification")
}

pub fn layout_parser<'src>()
-> impl Parser<'src, &'src str, Vec<LayoutSpec>, ParserExtra<'src>> + Clone {
    spec_parser()
        .separated_by(just('-'))
        .collect::<Vec<_>>()
        .then_ignore(end())
}

/// Parse a layout descriptor into its specifications, rendering every
/// diagnostic on failure.
pub fn parse_specs(descriptor: &str) -> Result<Vec<LayoutSpec>, Vec<String>> {
    layout_parser()
        .parse(descriptor)
        .into_result()
        .map_err(|errors| errors.into_iter().map(|e| e.to_string()).collect())
}
