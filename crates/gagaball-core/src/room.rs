use rand::Rng;

/// Length of a room code.
pub const ROOM_CODE_LEN: usize = 6;

/// Room code alphabet. Omits glyphs that are easy to misread (I, O, 0, 1).
pub const ROOM_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Maximum players in one match, humans and AI combined.
pub const MAX_PLAYERS: usize = 8;

/// Players a host needs in the roster (itself included) before a multiplayer
/// match can start.
pub const MIN_PLAYERS_TO_START: usize = 2;

/// Generate a random room code like `K7QW2M`.
pub fn generate_room_code() -> String {
    let mut rng = rand::rng();
    (0..ROOM_CODE_LEN)
        .map(|_| ROOM_CODE_ALPHABET[rng.random_range(0..ROOM_CODE_ALPHABET.len())] as char)
        .collect()
}

/// Check that a string is a well-formed room code. Lowercase is not accepted.
pub fn is_valid_room_code(code: &str) -> bool {
    code.len() == ROOM_CODE_LEN && code.bytes().all(|b| ROOM_CODE_ALPHABET.contains(&b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_codes_are_valid() {
        for _ in 0..100 {
            let code = generate_room_code();
            assert!(is_valid_room_code(&code), "Invalid room code: {code}");
        }
    }

    #[test]
    fn rejects_ambiguous_and_short_codes() {
        assert!(!is_valid_room_code("ABC"));
        assert!(!is_valid_room_code("ABCDE0"));
        assert!(!is_valid_room_code("abcdef"));
        assert!(is_valid_room_code("ABCDEF"));
    }
}
