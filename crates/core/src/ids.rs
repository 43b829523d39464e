/// An all-zero trace or span id means "not set" on the capture side.
pub fn is_zero(bytes: &[u8]) -> bool {
    bytes.iter().all(|b| *b == 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_detection() {
        assert!(is_zero(&[0; 8]));
        assert!(!is_zero(&[0, 0, 1]));
        assert!(is_zero(&[]));
    }
}
