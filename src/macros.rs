/// Builds a [`Context`][crate::Context] from `Name: value` pairs.
///
/// Each value can be anything that converts into a [`Value`][crate::Value].
///
/// # Examples
///
/// ```
/// let ctx = mealdrive::context! {
///     DriverName: "Alice",
///     IsSplit: true,
///     Deliveries: 3,
///     Restaurants: vec!["Bopshop", "Noodles"],
/// };
/// assert_eq!(ctx.len(), 4);
/// ```
#[macro_export]
macro_rules! context {
    () => {
        $crate::Context::new()
    };

    ($($name:ident : $value:expr),+ $(,)?) => {{
        let mut ctx = $crate::Context::new();
        $(
            let _ = ctx.insert(stringify!($name), $value);
        )+
        ctx
    }};
}
