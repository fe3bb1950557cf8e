// Macros to simplify rule declarations in tests

/// Builds a `Vec<Rule>` from `from => to` notation pairs, panicking on malformed rules.
macro_rules! rules {
    ($lang:expr; ) => {
        Vec::<$crate::rewriting::rule::Rule>::new()
    };
    ($lang:expr; $from:expr => $to:expr $(, $($rest:tt)*)? ) => {{
        let mut v = Vec::new();
        v.push($crate::rewriting::rule::Rule::from_strings($from, $to, &$lang).unwrap());
        $( v.extend($crate::macros::rules!($lang; $($rest)*)); )?
        v
    }};
}

pub(crate) use rules;
