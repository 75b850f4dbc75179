use uuid::Uuid;

const ALPHABET: &[u8; 57] = b"23456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";
/// 57^22 > 2^128, so every v4 uuid fits.
pub const CODE_LEN: usize = 22;

/// Base57 rendering of a uuid, most significant digit first, left padded.
pub fn encode(id: Uuid) -> String {
    let mut n = id.as_u128();
    let mut buf = [ALPHABET[0]; CODE_LEN];
    for slot in buf.iter_mut().rev() {
        *slot = ALPHABET[(n % ALPHABET.len() as u128) as usize];
        n /= ALPHABET.len() as u128;
    }
    buf.iter().map(|&b| b as char).collect()
}

/// Draws codes until one neither starts with a digit nor collides with a live code.
pub fn generate<F>(is_taken: F) -> String
where
    F: Fn(&str) -> bool,
{
    loop {
        let code = encode(Uuid::new_v4());
        if code.starts_with(|c: char| c.is_ascii_digit()) || is_taken(&code) {
            continue;
        }
        return code;
    }
}
