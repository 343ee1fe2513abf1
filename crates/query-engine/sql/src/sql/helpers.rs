//! Helpers for presenting statement text.

/// Collapse a multi-line statement onto one line for logs and span fields.
pub fn compact(sql: &str) -> String {
    sql.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace("( ", "(")
        .replace(" )", ")")
}

#[cfg(test)]
mod tests {
    use super::compact;

    #[test]
    fn it_compacts_indented_statements() {
        let sql = "
            SELECT *
            FROM (
                SELECT 1
            ) AS x
        ";
        assert_eq!(compact(sql), "SELECT * FROM (SELECT 1) AS x");
    }
}
