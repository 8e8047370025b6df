use bytesize::ByteSize;

/// Parse a human-readable byte size such as `"1.2 GB"`, `"700 MiB"` or
/// `"1,024 bytes"`.
///
/// Decimal units (`kB`, `MB`, ...) are powers of 1000, binary units (`KiB`,
/// `MiB`, ...) powers of 1024. Units are case-insensitive; a bare number is
/// bytes. Fractional results are truncated.
pub fn parse_size(value: &str) -> Option<u64> {
    let cleaned: String = value.trim().chars().filter(|c| *c != ',').collect();

    let split = cleaned
        .find(|c: char| c.is_alphabetic())
        .unwrap_or(cleaned.len());
    let (number, unit) = cleaned.split_at(split);
    let number = number.trim();

    if number.is_empty() || !number.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return None;
    }
    let unit = match unit.to_ascii_lowercase().as_str() {
        "" | "byte" | "bytes" => "B",
        _ => unit,
    };

    format!("{number} {unit}")
        .parse::<ByteSize>()
        .ok()
        .map(|size| size.as_u64())
}
