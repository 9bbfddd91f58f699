// src/macros.rs
#[macro_export]
macro_rules! s {
    // String shorthand!

    // Zero-arg → String::new()
    () => {
        ::std::string::String::new()
    };
    // Any single expression
    ($expr:expr) => {
        ::std::string::String::from($expr)
    };
}

#[macro_export]
macro_rules! join {
    // String-type concatenation shorthand!
    ($first:expr $(, $rest:expr)+ $(,)?) => {{
        let mut s = ::std::string::String::from($first);
        $(
            s.push_str($rest);
        )+
        s
    }};
}

/// Build a `StepCommand` from a label, a program and any number of
/// `ToString` args: `cmd!("capture", "agent-browser", "--session", session, "open", url)`.
#[macro_export]
macro_rules! cmd {
    ($label:expr, $program:expr $(, $arg:expr)* $(,)?) => {
        $crate::runner::StepCommand::new(
            $label,
            $program,
            ::std::vec![$(::std::string::ToString::to_string(&$arg)),*],
        )
    };
}
