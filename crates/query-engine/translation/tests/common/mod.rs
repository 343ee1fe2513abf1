use query_engine_sql::sql::string::{Arguments, NamedArgs, Param};

/// Bind the named arguments the way the execution layer does and render the
/// statement for failure messages.
pub fn bind(sql: &str, args: &NamedArgs) -> (String, Vec<(usize, Param)>) {
    let bound = Arguments::Named(args.clone())
        .bind(sql)
        .unwrap_or_else(|error| panic!("{error}\n{}", pretty(sql)));
    let params = bound
        .params
        .into_iter()
        .enumerate()
        .map(|(i, p)| (i + 1, p))
        .collect();
    (bound.sql, params)
}

pub fn pretty(sql: &str) -> String {
    sqlformat::format(
        sql,
        &sqlformat::QueryParams::None,
        sqlformat::FormatOptions::default(),
    )
}
