use super::PerfMapError;
use crate::symbols::Demangler;
use std::io::BufRead;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PerfMapAddr {
    pub start: u64,
    /// Exclusive.
    pub end: u64,
    pub symbol: String,
}

/// PerfMap is the parsed content of a `/tmp/perf-<pid>.map` file.
///
/// Entries are sorted by their end address. Looking up the first entry ending
/// after an address finds the closest enclosing range, which may be an inlined
/// instruction inside a larger blob.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PerfMap {
    addrs: Vec<PerfMapAddr>,
}

impl PerfMap {
    /// Parses `<hex start> <hex size> <symbol>` lines. Any malformed line fails
    /// the whole map. Symbols are taken as bytes; invalid UTF-8 is replaced,
    /// not rejected.
    pub fn parse<R: BufRead>(r: R) -> Result<Self, PerfMapError> {
        Self::parse_with(r, None)
    }

    pub(crate) fn parse_with<R: BufRead>(
        mut r: R,
        demangler: Option<&Demangler>,
    ) -> Result<Self, PerfMapError> {
        let mut addrs = Vec::new();
        let mut buf = Vec::new();

        loop {
            buf.clear();
            if r.read_until(b'\n', &mut buf)? == 0 {
                break;
            }
            let line = buf.strip_suffix(b"\n").unwrap_or(&buf);
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            let lossy = || String::from_utf8_lossy(line).into_owned();

            let mut fields = line.splitn(3, |&b| b == b' ');
            let (start, size, symbol) = match (fields.next(), fields.next(), fields.next()) {
                (Some(start), Some(size), Some(symbol)) => (start, size, symbol),
                _ => return Err(PerfMapError::Split { line: lossy() }),
            };

            let start =
                parse_hex(start).ok_or_else(|| PerfMapError::ParseStart { line: lossy() })?;
            let size = parse_hex(size).ok_or_else(|| PerfMapError::ParseSize { line: lossy() })?;
            let end = start
                .checked_add(size)
                .ok_or_else(|| PerfMapError::Overflow { line: lossy() })?;

            let symbol = String::from_utf8_lossy(symbol);
            let symbol = match demangler {
                Some(d) => d.demangle(&symbol),
                None => symbol.into_owned(),
            };

            addrs.push(PerfMapAddr { start, end, symbol });
        }

        addrs.sort_by_key(|a| a.end);

        Ok(Self { addrs })
    }

    /// Returns the symbol whose range contains `addr`, or `None` when the
    /// address is past the last range or falls in a gap.
    pub fn lookup(&self, addr: u64) -> Option<&str> {
        let idx = self.addrs.partition_point(|a| a.end <= addr);
        match self.addrs.get(idx) {
            Some(a) if a.start <= addr => Some(a.symbol.as_str()),
            _ => None,
        }
    }

    pub fn addrs(&self) -> &[PerfMapAddr] {
        &self.addrs
    }

    pub fn len(&self) -> usize {
        self.addrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addrs.is_empty()
    }
}

// strconv.ParseUint-style: hex digits only, no prefix, no sign.
fn parse_hex(s: &[u8]) -> Option<u64> {
    if s.is_empty() || !s.iter().all(u8::is_ascii_hexdigit) {
        return None;
    }
    u64::from_str_radix(std::str::from_utf8(s).ok()?, 16).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> Result<PerfMap, PerfMapError> {
        PerfMap::parse(s.as_bytes())
    }

    #[test]
    fn test_single_line() {
        let m = parse("1a 5 symbolA\n").unwrap();
        assert_eq!(
            m.addrs(),
            &[PerfMapAddr {
                start: 0x1a,
                end: 0x1f,
                symbol: "symbolA".into(),
            }]
        );
        assert_eq!(m.lookup(0x1a), Some("symbolA"));
        assert_eq!(m.lookup(0x1e), Some("symbolA"));
        assert_eq!(m.lookup(0x1f), None);
        assert_eq!(m.lookup(0x19), None);
    }

    #[test]
    fn test_symbol_with_spaces() {
        let m = parse("10 20 LazyCompile:~foo /app/index.js:1\n").unwrap();
        assert_eq!(m.lookup(0x15), Some("LazyCompile:~foo /app/index.js:1"));
    }

    #[test]
    fn test_gap() {
        let m = parse("0 a A\n14 a B\n").unwrap();
        assert_eq!(m.lookup(0), Some("A"));
        assert_eq!(m.lookup(9), Some("A"));
        assert_eq!(m.lookup(15), None);
        assert_eq!(m.lookup(20), Some("B"));
        assert_eq!(m.lookup(29), Some("B"));
        assert_eq!(m.lookup(30), None);
    }

    #[test]
    fn test_sorted_by_end() {
        // inner is inlined in outer
        let m = parse("100 100 outer\n120 10 inner\n0 10 first\n").unwrap();
        let ends: Vec<u64> = m.addrs().iter().map(|a| a.end).collect();
        assert_eq!(ends, vec![0x10, 0x130, 0x200]);
        assert_eq!(m.lookup(0x125), Some("inner"));
        // inner shadows the part of outer in front of it
        assert_eq!(m.lookup(0x110), None);
        assert_eq!(m.lookup(0x150), Some("outer"));
        assert_eq!(m.lookup(0x5), Some("first"));
    }

    #[test]
    fn test_crlf() {
        let m = parse("1a 5 symbolA\r\n").unwrap();
        assert_eq!(m.lookup(0x1a), Some("symbolA"));
    }

    #[test]
    fn test_non_utf8_symbol() {
        let m = PerfMap::parse(&b"1a 5 caf\xe9\n30 10 ok\n"[..]).unwrap();
        assert_eq!(m.lookup(0x1a), Some("caf\u{fffd}"));
        assert_eq!(m.lookup(0x35), Some("ok"));
    }

    #[test]
    fn test_non_utf8_numbers_are_parse_errors() {
        assert!(matches!(
            PerfMap::parse(&b"1\xe9 5 sym\n"[..]),
            Err(PerfMapError::ParseStart { .. })
        ));
    }

    #[test]
    fn test_last_line_without_newline() {
        let m = parse("1a 5 symbolA\n30 10 last").unwrap();
        assert_eq!(m.lookup(0x30), Some("last"));
    }

    #[test]
    fn test_empty_input() {
        let m = parse("").unwrap();
        assert!(m.is_empty());
        assert_eq!(m.lookup(0), None);
    }

    #[test]
    fn test_too_few_fields() {
        assert!(matches!(parse("1a 5\n"), Err(PerfMapError::Split { .. })));
        assert!(matches!(
            parse("1a 5 ok\n\n"),
            Err(PerfMapError::Split { .. })
        ));
    }

    #[test]
    fn test_bad_hex() {
        assert!(matches!(
            parse("zz 5 sym\n"),
            Err(PerfMapError::ParseStart { .. })
        ));
        assert!(matches!(
            parse("0x1a 5 sym\n"),
            Err(PerfMapError::ParseStart { .. })
        ));
        assert!(matches!(
            parse("1a +5 sym\n"),
            Err(PerfMapError::ParseSize { .. })
        ));
        assert!(matches!(
            parse("1a 10000000000000000 sym\n"),
            Err(PerfMapError::ParseSize { .. })
        ));
    }

    #[test]
    fn test_overflow() {
        let err = parse("1a 5 ok\nffffffffffffffff 1 sym\n").unwrap_err();
        assert!(matches!(err, PerfMapError::Overflow { .. }));

        let m = parse("fffffffffffffff0 f sym\n").unwrap();
        assert_eq!(m.lookup(0xfffffffffffffffe), Some("sym"));
    }

    #[test]
    fn test_demangle() {
        let d = Demangler::new(false);
        let m = PerfMap::parse_with("10 10 _ZNSaIcEC1ERKS_\n".as_bytes(), Some(&d)).unwrap();
        assert_eq!(
            m.lookup(0x10),
            Some("std::allocator<char>::allocator(std::allocator<char> const&)")
        );
    }
}
