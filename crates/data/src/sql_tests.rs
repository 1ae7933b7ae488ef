// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    select = { "SELECT * FROM users", false },
    select_lower = { "select 1", false },
    insert = { "INSERT INTO users VALUES (1)", true },
    update = { "update users set name = 'x'", true },
    delete = { "DELETE FROM users", true },
    truncate = { "TRUNCATE users", true },
    ddl_create = { "CREATE TABLE t (id int)", true },
    ddl_drop = { "drop table t", true },
    leading_whitespace = { "   \n  UPDATE t SET x = 1", true },
    line_comment = { "-- cleanup\nDELETE FROM t", true },
    block_comment = { "/* hint */ SELECT 1", false },
    with_select = { "WITH c AS (SELECT 1) SELECT * FROM c", false },
    with_insert = { "WITH c AS (SELECT 1) INSERT INTO t SELECT * FROM c", true },
    explain = { "EXPLAIN SELECT * FROM t", false },
    empty = { "", false },
    comment_only = { "-- nothing", false },
)]
fn classification(sql: &str, mutating: bool) {
    assert_eq!(is_mutating_sql(sql), mutating, "sql: {:?}", sql);
}
