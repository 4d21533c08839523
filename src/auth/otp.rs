// One-time password reset codes

use rand::Rng;

/// Number of digits in a reset code
pub const OTP_LENGTH: usize = 6;

/// Generate a uniformly random six-digit code in `100000..=999999`
pub fn generate_code() -> String {
    generate_code_with(&mut rand::thread_rng())
}

pub fn generate_code_with<R: Rng + ?Sized>(rng: &mut R) -> String {
    rng.gen_range(100_000..=999_999u32).to_string()
}

/// Shape check before touching the store
pub fn is_well_formed(code: &str) -> bool {
    code.len() == OTP_LENGTH && code.bytes().all(|b| b.is_ascii_digit())
}
