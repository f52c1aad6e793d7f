//! MySQL data-definition statements rendered from a descriptor.
//!
//! Rendering is pure string formatting. Every identifier reaching these
//! functions has already passed [`IdentifierGuard`](crate::identifier::IdentifierGuard),
//! so quoting with backticks is sufficient.

use crate::descriptor::{ColumnSpec, ForeignKeySpec, IndexKind, IndexSpec, SchemaDescriptor};

pub fn quote(identifier: &str) -> String {
    format!("`{identifier}`")
}

fn quote_list(identifiers: &[String]) -> String {
    identifiers
        .iter()
        .map(|c| quote(c))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn column_clause(column: &ColumnSpec) -> String {
    if column.definition.is_empty() {
        quote(&column.name)
    } else {
        format!("{} {}", quote(&column.name), column.definition)
    }
}

pub fn index_clause(index: &IndexSpec) -> String {
    match index.kind {
        IndexKind::Primary => format!("PRIMARY KEY ({})", quote_list(&index.columns)),
        IndexKind::Secondary => format!(
            "KEY {} ({})",
            quote(&index.name),
            quote_list(&index.columns)
        ),
    }
}

pub fn foreign_key_clause(fk: &ForeignKeySpec) -> String {
    format!(
        "CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({}) ON DELETE {} ON UPDATE {}",
        quote(&fk.constraint_name),
        quote(&fk.column),
        quote(&fk.ref_table),
        quote(&fk.ref_column),
        fk.on_delete,
        fk.on_update
    )
}

/// Render the full `CREATE TABLE` statement.
///
/// `charset_collate` is appended verbatim after the engine clause, e.g.
/// `DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_unicode_ci`.
pub fn create_table_sql(descriptor: &SchemaDescriptor, charset_collate: &str) -> String {
    let clauses: Vec<String> = descriptor
        .columns()
        .iter()
        .map(column_clause)
        .chain(descriptor.indexes().map(index_clause))
        .chain(descriptor.foreign_keys().iter().map(foreign_key_clause))
        .collect();

    let mut sql = format!(
        "CREATE TABLE {} (\n  {}\n) ENGINE={}",
        quote(descriptor.table_name()),
        clauses.join(",\n  "),
        descriptor.engine()
    );
    let charset_collate = charset_collate.trim();
    if !charset_collate.is_empty() {
        sql.push(' ');
        sql.push_str(charset_collate);
    }
    sql
}

pub fn add_column_sql(table: &str, column: &ColumnSpec) -> String {
    format!("ALTER TABLE {} ADD COLUMN {}", quote(table), column_clause(column))
}

pub fn add_index_sql(table: &str, index: &IndexSpec) -> String {
    format!("ALTER TABLE {} ADD {}", quote(table), index_clause(index))
}

pub fn add_foreign_key_sql(table: &str, fk: &ForeignKeySpec) -> String {
    format!("ALTER TABLE {} ADD {}", quote(table), foreign_key_clause(fk))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::ReferentialAction;

    fn notes() -> SchemaDescriptor {
        let mut d = SchemaDescriptor::with_prefix("wp_", "notes").unwrap();
        d.add_column("id", "BIGINT UNSIGNED NOT NULL AUTO_INCREMENT")
            .unwrap()
            .add_column("user_id", "BIGINT UNSIGNED NOT NULL")
            .unwrap()
            .add_column("content", "TEXT")
            .unwrap()
            .add_index("user_id_idx", &["user_id"])
            .unwrap()
            .add_primary("id")
            .unwrap()
            .add_foreign_key(
                "user_id",
                "users",
                "ID",
                ReferentialAction::Cascade,
                ReferentialAction::Cascade,
            )
            .unwrap();
        d
    }

    #[test]
    fn create_table_orders_columns_keys_then_foreign_keys() {
        let d = notes();
        let fk = d.foreign_keys()[0].constraint_name.clone();
        let sql = create_table_sql(&d, "DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_unicode_ci");

        let expected = format!(
            "CREATE TABLE `wp_notes` (\n  \
             `id` BIGINT UNSIGNED NOT NULL AUTO_INCREMENT,\n  \
             `user_id` BIGINT UNSIGNED NOT NULL,\n  \
             `content` TEXT,\n  \
             PRIMARY KEY (`id`),\n  \
             KEY `user_id_idx` (`user_id`),\n  \
             CONSTRAINT `{fk}` FOREIGN KEY (`user_id`) REFERENCES `wp_users` (`ID`) ON DELETE CASCADE ON UPDATE CASCADE\n\
             ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_unicode_ci"
        );
        assert_eq!(sql, expected);
    }

    #[test]
    fn create_table_without_charset_ends_at_engine() {
        let mut d = SchemaDescriptor::new("log").unwrap();
        d.add_column("line", "TEXT").unwrap().set_engine("ARCHIVE").unwrap();
        assert_eq!(
            create_table_sql(&d, "   "),
            "CREATE TABLE `log` (\n  `line` TEXT\n) ENGINE=ARCHIVE"
        );
    }

    #[test]
    fn alter_statements_target_one_gap_each() {
        let d = notes();
        let table = d.table_name();

        assert_eq!(
            add_column_sql(table, &d.columns()[2]),
            "ALTER TABLE `wp_notes` ADD COLUMN `content` TEXT"
        );
        assert_eq!(
            add_index_sql(table, d.primary_key().unwrap()),
            "ALTER TABLE `wp_notes` ADD PRIMARY KEY (`id`)"
        );
        assert_eq!(
            add_index_sql(table, &d.secondary_indexes()[0]),
            "ALTER TABLE `wp_notes` ADD KEY `user_id_idx` (`user_id`)"
        );

        let fk_sql = add_foreign_key_sql(table, &d.foreign_keys()[0]);
        assert!(fk_sql.starts_with("ALTER TABLE `wp_notes` ADD CONSTRAINT `fk_wp_notes_user_id_"));
        assert!(fk_sql.ends_with(
            "FOREIGN KEY (`user_id`) REFERENCES `wp_users` (`ID`) ON DELETE CASCADE ON UPDATE CASCADE"
        ));
    }

    #[test]
    fn composite_secondary_index_lists_columns_in_order() {
        let mut d = SchemaDescriptor::new("events").unwrap();
        d.add_index("by_owner_time", &["owner_id", "created_at"]).unwrap();
        assert_eq!(
            index_clause(&d.secondary_indexes()[0]),
            "KEY `by_owner_time` (`owner_id`, `created_at`)"
        );
    }
}
