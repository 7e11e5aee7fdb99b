pub use enclose::*;

/// Creates an effect, cloning the listed handles into it.
///
/// ```ignore
/// let e = effect!((state) => { log(state.get("count")); });
/// ```
#[macro_export]
macro_rules! effect {
    (( $($d_tt:tt)* ) => $($b:tt)*) => {
        $crate::effect($crate::macros::enclose!(($( $d_tt )*) move || { $($b)* }))
    };
    (=> $($b:tt)*) => {
        $crate::effect(move || { $($b)* })
    };
}

#[macro_export]
macro_rules! computed {
    (( $($d_tt:tt)* ) => $($b:tt)*) => {
        $crate::computed($crate::macros::enclose!(($( $d_tt )*) move || { $($b)* }))
    };
    (=> $($b:tt)*) => {
        $crate::computed(move || { $($b)* })
    };
}

/// Builds a raw record target from `key => value` pairs.
#[macro_export]
macro_rules! record {
    ($( $k:expr => $v:expr ),* $(,)?) => {{
        let target = $crate::Target::record();
        $( target.insert($k, $v); )*
        target
    }};
}

#[macro_export]
macro_rules! list {
    ($( $v:expr ),* $(,)?) => {{
        let target = $crate::Target::list();
        $( target.push($v); )*
        target
    }};
}
