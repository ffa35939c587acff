#[macro_export]
macro_rules! regex {
    ($pat:literal) => {{
        static RE: once_cell::sync::Lazy<regex::Regex> =
            once_cell::sync::Lazy::new(|| regex::Regex::new($pat).unwrap());
        &*RE
    }};
}

/// Builds a [`Handler`](crate::Handler) whose parameter names are written as
/// identifiers.
///
/// ```
/// use trellis::{Handler, Value, handler};
///
/// let h: Handler = handler!("greeting", [name, previous_result], |args| {
///     Ok(Value::Str(format!("hello {}", args.get("name").map(Value::to_text).unwrap_or_default())))
/// });
/// assert_eq!(h.signature().names(), ["name", "previous_result"]);
/// ```
#[macro_export]
macro_rules! handler {
    ($name:expr, [ $($param:ident),* $(,)? ], |$args:ident| $body:expr) => {
        $crate::Handler::new($name, &[ $(stringify!($param)),* ], move |$args| $body)
    };
}

/// Builds a [`Rule`](crate::Rule) from conditions and handlers.
///
/// ```
/// use trellis::{Rule, rule};
/// use trellis::handlers::{append, get_text};
///
/// let r: Rule = rule! {
///     name: "names",
///     conditions: ["person", "name"],
///     handlers: [get_text(), append("names")],
/// };
/// assert_eq!(r.conditions().len(), 2);
/// ```
#[macro_export]
macro_rules! rule {
    (
        $(name: $name:expr,)?
        conditions: [ $($cond:expr),* $(,)? ],
        handlers: [ $($handler:expr),* $(,)? ]
        $(, traversal_order: $order:expr)?
        $(, once: $once:expr)?
        $(,)?
    ) => {{
        let conditions: ::std::vec::Vec<$crate::Condition<_>> = vec![ $($crate::Condition::from($cond)),* ];
        let handlers: ::std::vec::Vec<$crate::Step<_>> = vec![ $($crate::Step::from($handler)),* ];
        let once = false $(|| $once)?;
        #[allow(unused_mut)]
        let mut rule = if once {
            $crate::Rule::once(conditions, handlers)
        } else {
            $crate::Rule::new(conditions, handlers)
        };
        $(rule = rule.named($name);)?
        $(rule = rule.with_traversal_order($order);)?
        rule
    }};
}
