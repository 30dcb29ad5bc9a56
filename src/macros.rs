/// Lazily compiled, process-wide `regex::Regex` for engine-internal patterns.
#[macro_export]
macro_rules! regex {
    ($pat:literal) => {{
        static RE: once_cell::sync::Lazy<regex::Regex> =
            once_cell::sync::Lazy::new(|| regex::Regex::new($pat).unwrap());
        &*RE
    }};
}

/// Build a [`Mode`](crate::Mode) from named fields.
///
/// ```
/// use glint::{mode, ModeRef};
///
/// let string = mode! {
///     scope: "string",
///     begin: "'",
///     end: "'",
///     illegal: "\\n",
///     contains: [mode! { begin: "\\\\[\\s\\S]", relevance: 0 }],
/// };
/// let array = mode! { begin: "\\[", end: "\\]", contains: [string, ModeRef::This] };
/// assert_eq!(array.contains.len(), 2);
/// ```
#[macro_export]
macro_rules! mode {
    ($($body:tt)*) => {{
        #[allow(unused_mut)]
        let mut mode = $crate::Mode::default();
        $crate::__mode_fields!(mode; $($body)*);
        mode
    }};
}

#[doc(hidden)]
#[macro_export]
macro_rules! __mode_fields {
    ($m:ident;) => {};
    ($m:ident; contains: [ $($child:expr),* $(,)? ] $(, $($rest:tt)*)?) => {
        $m.contains = vec![ $($crate::ModeRef::from($child)),* ];
        $crate::__mode_fields!($m; $($($rest)*)?);
    };
    ($m:ident; variants: [ $($variant:expr),* $(,)? ] $(, $($rest:tt)*)?) => {
        $m.variants = vec![ $($variant),* ];
        $crate::__mode_fields!($m; $($($rest)*)?);
    };
    ($m:ident; $field:ident : $value:expr $(, $($rest:tt)*)?) => {
        $crate::__mode_field!($m, $field, $value);
        $crate::__mode_fields!($m; $($($rest)*)?);
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __mode_field {
    ($m:ident, scope, $v:expr) => {
        $m.scope = Some(::std::string::String::from($v));
    };
    ($m:ident, begin, $v:expr) => {
        $m.begin = Some($crate::Pattern::from($v));
    };
    ($m:ident, end, $v:expr) => {
        $m.end = Some($crate::Pattern::from($v));
    };
    ($m:ident, matches, $v:expr) => {
        $m.matches = Some($crate::Pattern::from($v));
    };
    ($m:ident, illegal, $v:expr) => {
        $m.illegal = Some($crate::Pattern::from($v));
    };
    ($m:ident, lexemes, $v:expr) => {
        $m.lexemes = Some($crate::Pattern::from($v));
    };
    ($m:ident, begin_keywords, $v:expr) => {
        $m.begin_keywords = Some(::std::string::String::from($v));
    };
    ($m:ident, keywords, $v:expr) => {
        $m.keywords = Some($crate::Keywords::from($v));
    };
    ($m:ident, relevance, $v:expr) => {
        $m.relevance = Some($v);
    };
    ($m:ident, starts, $v:expr) => {
        $m.starts = Some(::std::boxed::Box::new($crate::ModeRef::from($v)));
    };
    ($m:ident, sub_language, $v:expr) => {
        $m.sub_language = Some($crate::SubLanguage::from($v));
    };
    ($m:ident, flags, $v:expr) => {
        $m.flags = $v;
    };
}
