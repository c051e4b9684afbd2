//! Text formats for states and Hamiltonian specifications.
//!
//! States are one basis entry per line, `bitstring<TAB>real<TAB>imag`;
//! Hamiltonians are one term per line, `coupling [ (i,j), (k,l), ... ]`.
//! In both grammars blank lines and lines starting with `#` are skipped on
//! input. Parse failures carry the 1-based line number.

use crate::error::{Result, SimError};
use crate::hamiltonian::{Edge, Heisenberg, Term};
use num_complex::Complex64;
use smallvec::SmallVec;
use spindrift_state::{ShardedState, SpinKey, StateConfig, MAX_SPINS};
use std::io::{BufRead, Write};

/// Reads a state in the line format above into a fresh table.
///
/// Duplicate bitstrings are an error; the input need not be normalised.
pub fn read_state<R: BufRead>(reader: R, config: StateConfig) -> Result<ShardedState> {
    let mut state = ShardedState::new(config)?;
    for (index, line) in reader.lines().enumerate() {
        let number = index + 1;
        let line = line?;
        let text = line.trim();
        if text.is_empty() || text.starts_with('#') {
            continue;
        }
        let mut fields = text.split_whitespace();
        let Some(token) = fields.next() else { continue };
        let spin = parse_spin_key(token, number)?;
        let re = parse_amplitude_field(fields.next(), number)?;
        let im = parse_amplitude_field(fields.next(), number)?;
        if fields.next().is_some() {
            return Err(SimError::parse(number, "trailing fields after the amplitude"));
        }
        state
            .try_insert(spin, Complex64::new(re, im))
            .map_err(|e| SimError::parse(number, e.to_string()))?;
    }
    Ok(state)
}

/// Writes a state as one entry per line. Entry order is unspecified.
pub fn write_state<W: Write>(mut writer: W, state: &ShardedState) -> Result<()> {
    for (spin, coeff) in state.iter() {
        writeln!(writer, "{}\t{}\t{}", spin, coeff.re, coeff.im)?;
    }
    Ok(())
}

/// Reads a Heisenberg specification, one term per line.
pub fn read_hamiltonian<R: BufRead>(reader: R) -> Result<Heisenberg> {
    let mut terms = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let number = index + 1;
        let line = line?;
        let text = line.trim();
        if text.is_empty() || text.starts_with('#') {
            continue;
        }
        terms.push(parse_term(text, number)?);
    }
    Ok(Heisenberg::new(terms))
}

fn parse_spin_key(token: &str, line: usize) -> Result<SpinKey> {
    if token.len() > MAX_SPINS {
        return Err(SimError::parse(
            line,
            format!(
                "configurations longer than {} spins are not supported",
                MAX_SPINS
            ),
        ));
    }
    let mut bits: SmallVec<[u8; 128]> = SmallVec::new();
    for c in token.chars() {
        match c {
            '0' => bits.push(0),
            '1' => bits.push(1),
            other => {
                return Err(SimError::parse(
                    line,
                    format!("allowed spin values are 0 and 1, got '{}'", other),
                ))
            }
        }
    }
    Ok(SpinKey::from_bits(&bits))
}

fn parse_amplitude_field(field: Option<&str>, line: usize) -> Result<f64> {
    let token = field
        .ok_or_else(|| SimError::parse(line, "expected bitstring, real part and imaginary part"))?;
    token
        .parse::<f64>()
        .map_err(|_| SimError::parse(line, format!("expected a number, got \"{}\"", token)))
}

fn parse_term(text: &str, line: usize) -> Result<Term> {
    let (coupling, rest) = parse_coupling(text, line)?;
    let (edges, rest) = parse_adjacency_list(rest, line)?;
    if !rest.trim().is_empty() {
        return Err(SimError::parse(
            line,
            format!("trailing input after the adjacency list: \"{}\"", rest.trim()),
        ));
    }
    Ok(Term {
        coupling: Complex64::new(coupling, 0.0),
        edges,
    })
}

fn parse_coupling(input: &str, line: usize) -> Result<(f64, &str)> {
    let input = input.trim_start();
    let end = input
        .find(|c: char| c.is_whitespace() || c == '[')
        .unwrap_or(input.len());
    let token = &input[..end];
    let value = token
        .parse::<f64>()
        .map_err(|_| SimError::parse(line, format!("expected a coupling, got \"{}\"", token)))?;
    Ok((value, &input[end..]))
}

fn parse_adjacency_list(input: &str, line: usize) -> Result<(Vec<Edge>, &str)> {
    let mut rest = expect_char(input, '[', line)?;
    let mut edges = Vec::new();
    if let Some(after) = rest.trim_start().strip_prefix(']') {
        return Ok((edges, after));
    }
    loop {
        let (edge, after_edge) = parse_edge(rest, line)?;
        edges.push(edge);
        rest = after_edge.trim_start();
        match rest.chars().next() {
            Some(']') => {
                rest = &rest[1..];
                break;
            }
            Some(',') => rest = &rest[1..],
            Some(other) => {
                return Err(SimError::parse(
                    line,
                    format!("expected ',' or ']', got '{}'", other),
                ))
            }
            None => return Err(SimError::parse(line, "missing the closing ']'")),
        }
    }
    Ok((edges, rest))
}

fn parse_edge(input: &str, line: usize) -> Result<(Edge, &str)> {
    let rest = expect_char(input, '(', line)?;
    let (i, rest) = parse_site(rest, line)?;
    let rest = expect_char(rest, ',', line)?;
    let (j, rest) = parse_site(rest, line)?;
    let rest = expect_char(rest, ')', line)?;
    Ok(((i, j), rest))
}

fn parse_site(input: &str, line: usize) -> Result<(usize, &str)> {
    let input = input.trim_start();
    let end = input
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(input.len());
    if end == 0 {
        return Err(SimError::parse(line, "expected a site index"));
    }
    let token = &input[..end];
    let value = token
        .parse::<usize>()
        .map_err(|_| SimError::parse(line, format!("site index \"{}\" overflows", token)))?;
    if value >= MAX_SPINS {
        return Err(SimError::parse(
            line,
            format!("site index {} out of range (at most {})", value, MAX_SPINS - 1),
        ));
    }
    Ok((value, &input[end..]))
}

fn expect_char(input: &str, expected: char, line: usize) -> Result<&str> {
    let input = input.trim_start();
    match input.strip_prefix(expected) {
        Some(rest) => Ok(rest),
        None => match input.chars().next() {
            Some(got) => Err(SimError::parse(
                line,
                format!("expected '{}', got '{}'", expected, got),
            )),
            None => Err(SimError::parse(
                line,
                format!("expected '{}', but the line ended", expected),
            )),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn config() -> StateConfig {
        StateConfig::new(100)
    }

    #[test]
    fn test_read_state_basic() {
        let text = "# a comment\n\n01\t1.0\t0.0\n10\t-0.5\t0.25\n";
        let state = read_state(Cursor::new(text), config()).unwrap();
        assert_eq!(state.len(), 2);
        assert_eq!(
            state.get(&SpinKey::from_bits(&[0, 1])),
            Some(Complex64::new(1.0, 0.0))
        );
        assert_eq!(
            state.get(&SpinKey::from_bits(&[1, 0])),
            Some(Complex64::new(-0.5, 0.25))
        );
    }

    #[test]
    fn test_read_state_rejects_duplicates() {
        let text = "01\t1.0\t0.0\n01\t2.0\t0.0\n";
        let err = read_state(Cursor::new(text), config()).unwrap_err();
        match err {
            SimError::Parse { line, message } => {
                assert_eq!(line, 2);
                assert!(message.contains("duplicate"));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_read_state_rejects_bad_spin() {
        let text = "012\t1.0\t0.0\n";
        let err = read_state(Cursor::new(text), config()).unwrap_err();
        assert!(matches!(err, SimError::Parse { line: 1, .. }));
    }

    #[test]
    fn test_read_state_rejects_overlong_bitstring() {
        let text = format!("{}\t1.0\t0.0\n", "0".repeat(MAX_SPINS + 1));
        let err = read_state(Cursor::new(text), config()).unwrap_err();
        assert!(matches!(err, SimError::Parse { line: 1, .. }));
    }

    #[test]
    fn test_read_state_rejects_missing_fields() {
        let err = read_state(Cursor::new("01\t1.0\n"), config()).unwrap_err();
        assert!(matches!(err, SimError::Parse { line: 1, .. }));
        let err = read_state(Cursor::new("01\t1.0\t0.0\t9\n"), config()).unwrap_err();
        assert!(matches!(err, SimError::Parse { line: 1, .. }));
    }

    #[test]
    fn test_state_round_trip() {
        let mut state = ShardedState::new(StateConfig::new(100).with_shards(8)).unwrap();
        let entries: [(&[u8], Complex64); 3] = [
            (&[0, 1, 1, 0], Complex64::new(0.125, -0.75)),
            (&[1, 0, 0, 1], Complex64::new(-1.0 / 3.0, 0.0)),
            (&[1, 1, 1, 1], Complex64::new(0.0, 2e-17)),
        ];
        for (bits, amplitude) in entries {
            state.try_insert(SpinKey::from_bits(bits), amplitude).unwrap();
        }
        let mut buffer = Vec::new();
        write_state(&mut buffer, &state).unwrap();
        let reread = read_state(Cursor::new(buffer), state.config().clone()).unwrap();
        assert_eq!(reread.len(), state.len());
        for (spin, coeff) in state.iter() {
            assert_eq!(reread.get(spin), Some(*coeff));
        }
    }

    #[test]
    fn test_read_hamiltonian_basic() {
        let text = "# chain of three sites\n1.0 [ (0,1), (1,2) ]\n-0.5 []\n";
        let h = read_hamiltonian(Cursor::new(text)).unwrap();
        assert_eq!(h.terms().len(), 2);
        assert_eq!(h.terms()[0].edges, vec![(0, 1), (1, 2)]);
        assert_eq!(h.terms()[0].coupling, Complex64::new(1.0, 0.0));
        assert!(h.terms()[1].edges.is_empty());
        assert_eq!(h.terms()[1].coupling, Complex64::new(-0.5, 0.0));
    }

    #[test]
    fn test_read_hamiltonian_tolerates_whitespace() {
        let text = "2.5[(0 , 1),(2,3) ,( 4,5)]\n";
        let h = read_hamiltonian(Cursor::new(text)).unwrap();
        assert_eq!(h.terms()[0].edges, vec![(0, 1), (2, 3), (4, 5)]);
    }

    #[test]
    fn test_read_hamiltonian_rejects_malformed_lines() {
        for text in [
            "abc [ (0,1) ]\n",
            "1.0 [ (0,1\n",
            "1.0 [ (0,1) (1,2) ]\n",
            "1.0 [ (0,1), ]\n",
            "1.0 (0,1)\n",
            "1.0 [ (0,1) ] junk\n",
            "1.0 [ (0,200) ]\n",
        ] {
            assert!(
                read_hamiltonian(Cursor::new(text)).is_err(),
                "accepted {:?}",
                text
            );
        }
    }

    #[test]
    fn test_read_hamiltonian_reports_line_numbers() {
        let text = "1.0 [ (0,1) ]\n# fine\n1.0 [ oops ]\n";
        let err = read_hamiltonian(Cursor::new(text)).unwrap_err();
        assert!(matches!(err, SimError::Parse { line: 3, .. }));
    }
}
