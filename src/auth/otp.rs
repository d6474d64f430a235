//! One-time passcodes for email verification

use rand::Rng;

/// Number of digits in a passcode
pub const OTP_LENGTH: usize = 6;

/// How long a freshly minted passcode stays valid
pub const OTP_TTL_MINUTES: i64 = 10;

/// Mint a numeric passcode, zero padded to [`OTP_LENGTH`] digits
pub fn generate_otp() -> String {
    let mut rng = rand::thread_rng();
    let code: u32 = rng.gen_range(0..1_000_000);
    format!("{:0width$}", code, width = OTP_LENGTH)
}
