use dbtree_core::{
    ColumnInfo, FunctionInfo, IndexInfo, IndexType, ProcedureInfo, SchemaContents, TableDetail,
    TriggerInfo, ViewInfo,
};

/// Schema contents with tables only.
pub fn contents(tables: &[&str]) -> SchemaContents {
    SchemaContents {
        tables: tables.iter().map(|t| t.to_string()).collect(),
        ..SchemaContents::default()
    }
}

pub fn view(name: impl Into<String>, definition: impl Into<String>) -> ViewInfo {
    ViewInfo {
        name: name.into(),
        definition: definition.into(),
    }
}

pub fn procedure(name: impl Into<String>, definition: impl Into<String>) -> ProcedureInfo {
    ProcedureInfo {
        name: name.into(),
        definition: definition.into(),
    }
}

pub fn function(
    name: impl Into<String>,
    definition: impl Into<String>,
    return_type: impl Into<String>,
) -> FunctionInfo {
    FunctionInfo {
        name: name.into(),
        definition: definition.into(),
        return_type: return_type.into(),
    }
}

pub fn trigger(
    name: impl Into<String>,
    table: impl Into<String>,
    definition: impl Into<String>,
) -> TriggerInfo {
    TriggerInfo {
        name: name.into(),
        definition: definition.into(),
        table: table.into(),
    }
}

pub fn column(name: impl Into<String>, data_type: impl Into<String>, nullable: bool) -> ColumnInfo {
    ColumnInfo {
        name: name.into(),
        data_type: data_type.into(),
        nullable,
        is_primary_key: false,
        is_foreign_key: false,
        default_value: None,
    }
}

pub fn primary_key(name: impl Into<String>, data_type: impl Into<String>) -> ColumnInfo {
    ColumnInfo {
        is_primary_key: true,
        ..column(name, data_type, false)
    }
}

pub fn index(name: impl Into<String>, index_type: IndexType, columns: &[&str]) -> IndexInfo {
    IndexInfo {
        name: name.into(),
        index_type,
        columns: columns.iter().map(|c| c.to_string()).collect(),
        is_unique: matches!(index_type, IndexType::Primary | IndexType::Unique),
    }
}

pub fn table_detail(columns: Vec<ColumnInfo>, indexes: Vec<IndexInfo>) -> TableDetail {
    TableDetail { columns, indexes }
}

pub fn users_detail() -> TableDetail {
    table_detail(
        vec![
            primary_key("id", "int"),
            column("email", "varchar(100)", false),
            column("created_at", "timestamp", true),
        ],
        vec![
            index("pk_users", IndexType::Primary, &["id"]),
            index("uk_users_email", IndexType::Unique, &["email"]),
        ],
    )
}

/// Every object kind populated, modeled on a small departments database.
pub fn deptdb_contents() -> SchemaContents {
    SchemaContents {
        tables: ["customers", "department", "employee", "orders", "products"]
            .into_iter()
            .map(String::from)
            .collect(),
        views: vec![
            view(
                "employee_summary",
                "SELECT e.id, e.name, d.department_name FROM employee e JOIN department d ON e.department_id = d.id",
            ),
            view(
                "sales_report",
                "SELECT p.name, SUM(po.quantity) AS total_sold FROM products p JOIN products_ordered po ON p.id = po.product_id GROUP BY p.name",
            ),
        ],
        procedures: vec![procedure(
            "process_order",
            "CREATE OR REPLACE PROCEDURE process_order(order_id INT) AS $$ BEGIN UPDATE orders SET status = 'processed' WHERE id = order_id; END; $$ LANGUAGE plpgsql;",
        )],
        functions: vec![function(
            "get_employee_count",
            "CREATE OR REPLACE FUNCTION get_employee_count(dept_id INT) RETURNS INT AS $$ BEGIN RETURN (SELECT COUNT(*) FROM employee WHERE department_id = dept_id); END; $$ LANGUAGE plpgsql;",
            "INT",
        )],
        triggers: vec![trigger(
            "update_employee_modified",
            "employee",
            "CREATE TRIGGER update_employee_modified BEFORE UPDATE ON employee FOR EACH ROW EXECUTE FUNCTION update_modified_column();",
        )],
    }
}

pub fn employee_detail() -> TableDetail {
    let mut department_id = column("department_id", "int", true);
    department_id.is_foreign_key = true;

    let mut created_at = column("created_at", "timestamp", false);
    created_at.default_value = Some("CURRENT_TIMESTAMP".to_string());

    table_detail(
        vec![
            primary_key("id", "int"),
            column("name", "varchar(50)", false),
            column("email", "varchar(100)", false),
            department_id,
            created_at,
        ],
        vec![
            index("pk_employee", IndexType::Primary, &["id"]),
            index("uk_employee_email", IndexType::Unique, &["email"]),
            index("fk_employee_dept", IndexType::Foreign, &["department_id"]),
        ],
    )
}
