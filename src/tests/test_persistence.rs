use std::io::{self, BufReader, Read};

use crate::core::CorrelationMatrix;
use crate::error::CorrError;
use crate::persistence::DiagonalPolicy;
use crate::ratings::EntityType;
use crate::similarity::Similarity;
use crate::tests::test_data::random_matrix;

fn written(m: &CorrelationMatrix) -> String {
    let mut buffer = Vec::new();
    m.write(&mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}

fn read(text: &str) -> crate::error::Result<CorrelationMatrix> {
    CorrelationMatrix::read(text.as_bytes(), DiagonalPolicy::One)
}

fn parse_line(result: crate::error::Result<CorrelationMatrix>) -> usize {
    match result {
        Err(CorrError::Parse { line, message }) => {
            log::debug!("parse error at {}: {}", line, message);
            line
        }
        other => panic!("expected a parse error, got {:?}", other),
    }
}

/// Fails after handing out `limit` bytes.
struct FailingReader {
    data: Vec<u8>,
    limit: usize,
    pos: usize,
}

impl Read for FailingReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pos >= self.limit {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "connection dropped"));
        }
        let end = self.limit.min(self.data.len()).min(self.pos + buf.len());
        let n = end - self.pos;
        buf[..n].copy_from_slice(&self.data[self.pos..end]);
        self.pos = end;
        Ok(n)
    }
}

#[test]
fn test_write_format() {
    crate::init();
    let mut m = CorrelationMatrix::new(3).unwrap();
    m.set(0, 1, 0.5).unwrap();
    m.set(2, 1, -0.25).unwrap();
    m.set_diagonal(1.0);
    assert_eq!(written(&m), "3\n0 1 0.5\n1 2 -0.25\n");

    assert_eq!(written(&CorrelationMatrix::default()), "0\n");
}

#[test]
fn test_read_sets_cells_and_diagonal() {
    let m = read("3\n0 1 0.5\n2 1 -0.25\n").unwrap();
    assert_eq!(m.dim(), 3);
    assert_eq!(m.get(1, 0).unwrap(), 0.5);
    assert_eq!(m.get(1, 2).unwrap(), -0.25);
    assert_eq!(m.get(0, 2).unwrap(), 0.0);
    for i in 0..3 {
        assert_eq!(m.get(i, i).unwrap(), 1.0);
    }

    let zero = CorrelationMatrix::read("3\n0 1 0.5\n".as_bytes(), DiagonalPolicy::Zero).unwrap();
    assert_eq!(zero.get(1, 1).unwrap(), 0.0);
    assert_eq!(zero.get(0, 1).unwrap(), 0.5);
}

#[test]
fn test_round_trip_computed_matrix() {
    crate::init();
    let ratings = random_matrix(40, 30, 0.3, 8);
    let mut m = CorrelationMatrix::default();
    Similarity::default()
        .compute_all(&mut m, ratings.by_entity(EntityType::Item))
        .unwrap();

    let restored = read(&written(&m)).unwrap();
    assert_eq!(restored, m);
}

#[test]
fn test_read_tolerates_whitespace() {
    let m = read("\n  2  \n\n0\t1   0.75\r\n\n").unwrap();
    assert_eq!(m.dim(), 2);
    assert_eq!(m.get(1, 0).unwrap(), 0.75);
}

#[test]
fn test_empty_and_header_only() {
    assert_eq!(parse_line(read("")), 1);
    assert_eq!(parse_line(read("\n\n")), 1);

    let m = read("0\n").unwrap();
    assert!(m.is_empty());
    let m = read("4").unwrap();
    assert_eq!(m.dim(), 4);
    assert_eq!(m.get(3, 3).unwrap(), 1.0);
}

#[test]
fn test_malformed_lines_report_position() {
    assert_eq!(parse_line(read("three\n")), 1);
    assert_eq!(parse_line(read("-3\n")), 1);
    assert_eq!(parse_line(read("3\n0 1 0.5\n1 2\n")), 3);
    assert_eq!(parse_line(read("3\n0 1 0.5 7\n")), 2);
    assert_eq!(parse_line(read("3\n\n0 x 0.5\n")), 3);
    assert_eq!(parse_line(read("3\n0 1 high\n")), 2);
    assert_eq!(parse_line(read("3\n0 1 NaN\n")), 2);
    assert_eq!(parse_line(read("3\n0 1 inf\n")), 2);
}

#[test]
fn test_entity_id_too_big() {
    match read("3\n0 1 0.5\n3 0 0.1\n") {
        Err(CorrError::Parse { line, message }) => {
            assert_eq!(line, 3);
            assert!(message.contains("too big"), "{}", message);
        }
        other => panic!("expected a parse error, got {:?}", other),
    }
    assert_eq!(parse_line(read("2\n0 2 0.1\n")), 2);
}

#[test]
fn test_truncated_line_fails() {
    // cut in the middle of the second record
    assert_eq!(parse_line(read("3\n0 1 0.5\n1 2")), 3);
}

#[test]
fn test_oversized_header_is_capacity_error() {
    assert!(matches!(
        read(&format!("{}\n", usize::MAX)),
        Err(CorrError::Capacity { .. })
    ));
}

#[test]
fn test_io_failures_surface() {
    let data = b"3\n0 1 0.5\n1 2 0.25\n".to_vec();
    let reader = BufReader::new(FailingReader {
        data,
        limit: 12,
        pos: 0,
    });
    assert!(matches!(
        CorrelationMatrix::read(reader, DiagonalPolicy::One),
        Err(CorrError::Io(_))
    ));

    let invalid_utf8: &[u8] = b"3\n0 1 \xff\n";
    assert!(matches!(
        CorrelationMatrix::read(invalid_utf8, DiagonalPolicy::One),
        Err(CorrError::Io(_))
    ));
}

#[test]
fn test_write_failure_surfaces() {
    struct Full;
    impl io::Write for Full {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::WriteZero, "disk full"))
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }
    let m = CorrelationMatrix::new(2).unwrap();
    assert!(matches!(m.write(Full), Err(CorrError::Io(_))));
}
