//! A1-style cell references. Rows and columns are numbered from 1.

/// Converts a 1-based column number to its letters (1 → `A`, 27 → `AA`).
pub fn column_name(col: usize) -> String {
    let mut col = col;
    let mut letters = Vec::new();
    while col > 0 {
        col -= 1;
        letters.push(b'A' + (col % 26) as u8);
        col /= 26;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

/// Converts column letters to a 1-based column number (case-insensitive).
pub fn column_index(letters: &str) -> Option<usize> {
    if letters.is_empty() {
        return None;
    }
    letters.chars().try_fold(0usize, |index, character| {
        let character = character.to_ascii_uppercase();
        if character.is_ascii_uppercase() {
            index
                .checked_mul(26)?
                .checked_add(character as usize - 'A' as usize + 1)
        } else {
            None
        }
    })
}

/// Formats a 1-based `(row, col)` position as a reference such as `B3`.
pub fn to_reference(row: usize, col: usize) -> String {
    format!("{}{}", column_name(col), row)
}

/// Parses a reference such as `B3` (or `$B$3`) into a 1-based `(row, col)` position.
pub fn parse_reference(reference: &str) -> Option<(usize, usize)> {
    let reference = reference.replace('$', "");
    let split = reference.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = reference.split_at(split);
    let col = column_index(letters)?;
    let row = digits.parse::<usize>().ok().filter(|row| *row > 0)?;
    Some((row, col))
}
