//! Macros for reducing boilerplate when declaring resources

/// Build a [`Schema`](crate::core::schema::Schema) from `name => field` pairs
///
/// Fields keep the order in which they are written.
///
/// # Example
/// ```rust,ignore
/// let schema = schema! {
///     "pk" => Field::integer().pk(),
///     "name" => Field::string().max_length(64),
///     "nickname" => Field::string().optional(),
/// };
/// ```
#[macro_export]
macro_rules! schema {
    () => {
        $crate::core::schema::Schema::new()
    };
    ($($name:literal => $field:expr),+ $(,)?) => {
        $crate::core::schema::Schema::new()$(.field($name, $field))+
    };
}

/// Declare a resource with an inline schema and optional links
///
/// # Example
/// ```rust,ignore
/// let teacher = resource!("Teacher", {
///     "pk" => Field::integer().pk(),
///     "name" => Field::string(),
/// } links [
///     LinkDeclaration::to_many("courses", "Course").related_name("teacher").master(),
/// ]);
/// ```
#[macro_export]
macro_rules! resource {
    ($name:expr, { $($fields:tt)* }) => {
        $crate::core::resource::ResourceDeclaration::new($name)
            .schema($crate::schema!($($fields)*))
    };
    ($name:expr, { $($fields:tt)* } links [ $($link:expr),* $(,)? ]) => {
        $crate::core::resource::ResourceDeclaration::new($name)
            .schema($crate::schema!($($fields)*))
            $(.link($link))*
    };
}
