macro_rules! ensure_size {
    (in: $cursor:ident, size: $expected:expr, field: $field:expr) => {{
        let received = $cursor.len();
        let expected = $expected;
        if received < expected {
            return Err($crate::ClearError::NotEnoughBytes {
                field: $field,
                received,
                expected,
            });
        }
    }};
}
