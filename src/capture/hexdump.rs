//! Canonical hex dump rendering.

use std::fmt::Write;

const ROW: usize = 16;

/// Render `data` as `offset  hex bytes  |ascii|` rows of 16 bytes.
///
/// The hex column is split into two groups of eight and padded so the
/// ASCII column always lines up.
pub fn hex_dump(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len().div_ceil(ROW) * 79);

    for (row, chunk) in data.chunks(ROW).enumerate() {
        let _ = write!(out, "{:08x}  ", row * ROW);
        for i in 0..ROW {
            match chunk.get(i) {
                Some(byte) => {
                    let _ = write!(out, "{:02x} ", byte);
                }
                None => out.push_str("   "),
            }
            if i == 7 {
                out.push(' ');
            }
        }
        out.push_str(" |");
        for &byte in chunk {
            out.push(if (0x20..=0x7e).contains(&byte) {
                byte as char
            } else {
                '.'
            });
        }
        out.push_str("|\n");
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Recover the bytes from the hex column.
    fn parse_dump(dump: &str) -> Vec<u8> {
        dump.lines()
            .flat_map(|line| {
                let hex = &line[10..line.find(" |").unwrap()];
                hex.split_whitespace()
                    .map(|b| u8::from_str_radix(b, 16).unwrap())
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    #[test]
    fn single_partial_row() {
        assert_eq!(
            hex_dump(b"hello world\n"),
            "00000000  68 65 6c 6c 6f 20 77 6f  72 6c 64 0a              |hello world.|\n"
        );
    }

    #[test]
    fn full_rows_and_offsets() {
        let data: Vec<u8> = (0u8..40).collect();
        let dump = hex_dump(&data);
        let lines: Vec<&str> = dump.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("00000010  10 11"));
        assert!(lines[2].starts_with("00000020  20 21"));
        assert_eq!(parse_dump(&dump), data);
    }

    #[test]
    fn empty_input() {
        assert_eq!(hex_dump(&[]), "");
    }

    #[test]
    fn dump_contains_exact_bytes() {
        let data = [0x00, 0xff, 0x7f, b'|', b'A'];
        assert_eq!(parse_dump(&hex_dump(&data)), data);
    }
}
