use crate::domain_model::InviteCode;
use crate::domain_port::InviteCodeGenerator;

pub const DEFAULT_INVITE_CODE_LENGTH: usize = 6;

const INVITE_CODE_ALPHABET: [char; 36] = [
    'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'I', 'J', 'K', 'L', 'M', 'N', 'O', 'P', 'Q', 'R',
    'S', 'T', 'U', 'V', 'W', 'X', 'Y', 'Z', '0', '1', '2', '3', '4', '5', '6', '7', '8', '9',
];

/// Uniform random codes over `[A-Z0-9]`.
#[derive(Debug, Clone)]
pub struct NanoidCodeGenerator {
    length: usize,
}

impl NanoidCodeGenerator {
    pub fn new(length: usize) -> Self {
        NanoidCodeGenerator {
            length: length.clamp(1, crate::domain_model::MAX_INVITE_CODE_LENGTH),
        }
    }
}

impl Default for NanoidCodeGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_INVITE_CODE_LENGTH)
    }
}

impl InviteCodeGenerator for NanoidCodeGenerator {
    fn generate(&self) -> InviteCode {
        let length = self.length;
        loop {
            let raw = nanoid::nanoid!(length, &INVITE_CODE_ALPHABET);
            if let Some(code) = InviteCode::parse(&raw) {
                return code;
            }
        }
    }
}
