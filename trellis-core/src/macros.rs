//! Literal builders for raw containers.

/// Build a raw record: `record! { "name" => "ada", "age" => 36 }`.
#[macro_export]
macro_rules! record {
    () => {
        $crate::reactive::RawObject::record()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {
        $crate::reactive::RawObject::record_from([
            $(($key, $crate::reactive::Value::from($value))),+
        ])
    };
}

/// Build a raw sequence: `seq![1, 2, 3]`.
#[macro_export]
macro_rules! seq {
    () => {
        $crate::reactive::RawObject::sequence(::std::iter::empty::<$crate::reactive::Value>())
    };
    ($($item:expr),+ $(,)?) => {
        $crate::reactive::RawObject::sequence([
            $($crate::reactive::Value::from($item)),+
        ])
    };
}
