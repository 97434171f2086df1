/// Declares a test that stores `value` into local 0 of type `target` and
/// compares the outcome with `expected`: either the emitted instructions or
/// the error.
///
/// `$b` names the [`NodeBuilder`](stackgen::NodeBuilder) both expressions
/// may use.
#[macro_export]
macro_rules! store_case {
    (
        $name:ident,
        |$b:ident| value: $value:expr,
        target: $target:expr,
        expected: $expected:expr $(,)?
    ) => {
        #[test]
        fn $name() {
            let arena = bumpalo::Bump::new();
            let types = stackgen::TypeManager::new(&arena);
            let $b = stackgen::NodeBuilder::new(&arena, types);
            let dest = $b.local(0, $target, "dest").unwrap();

            let mut sink = stackgen::CodeBuffer::new();
            let result = dest
                .emit_store(&mut sink, $value)
                .map(|()| sink.instructions().to_vec());
            pretty_assertions::assert_eq!(result, $expected);
        }
    };
}
