use hyir::{
    Context, DataLayout, Module,
    layout::{AlignKind, Endianness, Mangling},
};

const DESCRIPTORS: &[&str] = &[
    "",
    "e",
    "E-m:o-p:32:32-i64:64-n32-S64",
    "e-m:e-p270:32:32-p271:32:32-p272:64:64-i64:64-i128:128-f80:128-n8:16:32:64-S128",
    "e-m:e-p:64:64-i64:64-i128:128-n32:64-S128",
    "e-m:w-p:32:32-i64:64-f80:32-n8:16:32-a:0:32-S32",
    "E-m:a-p:32:32-i64:64-n32",
    "e-p:32:32:32:32-p1:64:64:64:32-P1-A5-G1-v128:128:128",
];

#[test]
fn display_reparses_to_an_equal_layout() {
    for descriptor in DESCRIPTORS {
        let layout = DataLayout::parse(descriptor).unwrap();
        let rendered = layout.to_string();
        let reparsed: DataLayout = rendered.parse().unwrap();
        assert_eq!(layout, reparsed, "`{descriptor}` rendered as `{rendered}`");
    }
}

#[test]
fn failed_set_keeps_the_previous_layout() {
    let mut module = Module::new("m", Context::new());
    module.set_data_layout_str(DESCRIPTORS[2]).unwrap();
    assert!(module.data_layout().is_big_endian());

    for bad in ["x", "e-p:0:64", "e-i64:48", "e-p:64:64:32", "e--S128", "e-m:q"] {
        let err = module.set_data_layout_str(bad).unwrap_err();
        assert!(err.is_layout_parse(), "`{bad}` gave {err:?}");
        assert!(module.data_layout().is_big_endian());
        assert_eq!(module.data_layout().mangling(), Some(Mangling::MachO));
    }
}

#[test]
fn set_layout_value_replaces_directly() {
    let mut module = Module::new("m", Context::new());
    assert!(module.data_layout().is_unspecified());

    let layout = DataLayout::parse("E-p:32:32-n32").unwrap();
    module.set_data_layout(layout.clone());
    assert_eq!(module.data_layout(), &layout);
    assert_eq!(module.data_layout().endianness(), Endianness::Big);
    assert_eq!(module.data_layout().pointer_size_in_bits(0), 32);
}

#[test]
fn queries_on_a_real_target() {
    let layout = DataLayout::parse(DESCRIPTORS[3]).unwrap();
    assert_eq!(layout.pointer_size_in_bits(0), 64);
    assert_eq!(layout.pointer_size_in_bits(270), 32);
    assert_eq!(layout.stack_natural_align(), Some(128));
    assert!(layout.is_legal_integer(16));
    assert!(!layout.is_legal_integer(128));
    assert_eq!(layout.int_abi_align(128), 128);
    assert_eq!(
        layout.alignment(AlignKind::Float, 80).map(|spec| spec.abi_align),
        Some(128)
    );
}
