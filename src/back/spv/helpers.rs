use spirv::Word;

/// Pack a UTF-8 string into SPIR-V words: little-endian bytes with a
/// guaranteed nul terminator, padded to a word boundary.
pub(super) fn string_to_words(input: &str) -> Vec<Word> {
    let bytes = input.as_bytes();
    let mut words: Vec<Word> = bytes
        .chunks(4)
        .map(|chunk| {
            chunk
                .iter()
                .rev()
                .fold(0u32, |word, &byte| (word << 8) | byte as u32)
        })
        .collect();
    if bytes.len() % 4 == 0 {
        // nul-termination
        words.push(0);
    }
    words
}

#[cfg(test)]
mod tests {
    use super::string_to_words;

    #[test]
    fn strings_are_nul_terminated_and_padded() {
        assert_eq!(string_to_words(""), &[0]);
        assert_eq!(string_to_words("a"), &[0x61]);
        assert_eq!(string_to_words("main"), &[0x6e69616d, 0]);
        assert_eq!(string_to_words("mains"), &[0x6e69616d, 0x73]);
    }
}
