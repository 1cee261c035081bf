//! Table-driven machine-integer round-trip and overflow properties,
//! covering the width/sign combinations the checkers rely on.

use absint_core::num::{MachineInt, OverflowMode, Sign};
use test_case::test_case;

#[test_case(0, 8, Sign::Unsigned; "zero u8")]
#[test_case(255, 8, Sign::Unsigned; "max u8")]
#[test_case(-128, 8, Sign::Signed; "min i8")]
#[test_case(127, 8, Sign::Signed; "max i8")]
#[test_case(1234, 32, Sign::Signed; "mid i32")]
#[test_case(u32::MAX as i128, 32, Sign::Unsigned; "max u32")]
fn cast_to_self_width_is_identity(value: i128, width: u32, sign: Sign) {
    let x = MachineInt::new(value, width, sign);
    assert_eq!(x.cast(width, sign), x);
}

#[test_case(8, 16; "u8 to u16")]
#[test_case(16, 32; "u16 to u32")]
#[test_case(32, 64; "u32 to u64")]
fn zero_extend_then_truncate_is_identity(narrow: u32, wide: u32) {
    let x = MachineInt::new(200, narrow, Sign::Unsigned);
    let extended = x.ext(wide);
    assert_eq!(extended.trunc(narrow), x);
}

#[test_case(200, 100, 8, Sign::Unsigned; "u8 overflow wraps")]
#[test_case(127, 1, 8, Sign::Signed; "i8 overflow wraps")]
fn wrap_mode_add_never_fails(a: i128, b: i128, width: u32, sign: Sign) {
    let x = MachineInt::new(a, width, sign);
    let y = MachineInt::new(b, width, sign);
    assert!(x.add(&y, OverflowMode::Wrap).unwrap().is_some());
}

#[test_case(200, 100, 8, Sign::Unsigned; "u8 overflow is bottom")]
#[test_case(127, 1, 8, Sign::Signed; "i8 overflow is bottom")]
fn no_wrap_mode_add_signals_overflow(a: i128, b: i128, width: u32, sign: Sign) {
    let x = MachineInt::new(a, width, sign);
    let y = MachineInt::new(b, width, sign);
    assert_eq!(x.add(&y, OverflowMode::NoWrap).unwrap(), None);
}

#[test_case(10, 3, 1; "u32 rem")]
#[test_case(-10, 3, -1; "i32 rem truncates toward zero")]
fn rem_matches_truncating_division(a: i128, b: i128, expected: i128) {
    let x = MachineInt::new(a, 32, Sign::Signed);
    let y = MachineInt::new(b, 32, Sign::Signed);
    assert_eq!(x.rem(&y).unwrap().unwrap().value(), expected);
}

#[test]
fn shift_amount_at_or_past_bit_width_is_bottom() {
    let x = MachineInt::new(1, 8, Sign::Unsigned);
    let shift = MachineInt::new(8, 8, Sign::Unsigned);
    assert_eq!(x.shl(&shift, OverflowMode::Wrap).unwrap(), None);
}

#[test]
fn sign_cast_roundtrips_bit_pattern() {
    let x = MachineInt::new(200, 8, Sign::Unsigned);
    let back = x.sign_cast(Sign::Signed).sign_cast(Sign::Unsigned);
    assert_eq!(x, back);
}

#[test]
fn mismatched_width_comparison_is_an_error() {
    let a = MachineInt::new(1, 8, Sign::Unsigned);
    let b = MachineInt::new(1, 16, Sign::Unsigned);
    assert!(a.compare(&b).is_err());
}
