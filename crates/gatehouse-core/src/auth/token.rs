use rand::Rng;

const TOKEN_PREFIX: &str = "token_";

/// Random base-36 characters per token, before the timestamp suffix.
const TOKEN_RANDOM_LEN: usize = 16;

const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Generate an opaque bearer token.
///
/// The token carries no claims; it only marks that a session exists. Shape is
/// `token_<random base36><issue time in base36 millis>`.
pub fn generate_token(now_ms: i64) -> String {
    let mut rng = rand::thread_rng();
    let random: String = (0..TOKEN_RANDOM_LEN)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect();
    format!("{}{}{}", TOKEN_PREFIX, random, to_base36(now_ms.max(0) as u64))
}

fn to_base36(mut value: u64) -> String {
    if value == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while value > 0 {
        digits.push(BASE36[(value % 36) as usize]);
        value /= 36;
    }
    digits.reverse();
    String::from_utf8_lossy(&digits).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_shape() {
        let token = generate_token(1_700_000_000_000);
        assert!(token.starts_with("token_"));
        assert!(token.ends_with(&to_base36(1_700_000_000_000)));
        assert!(token[TOKEN_PREFIX.len()..]
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
    }

    #[test]
    fn test_tokens_differ() {
        assert_ne!(generate_token(0), generate_token(0));
    }

    #[test]
    fn test_to_base36() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
    }
}
