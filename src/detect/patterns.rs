//! SQL-injection pattern catalog.
//!
//! The catalog is an ordered list of case-insensitive regular expressions,
//! derived deterministically from a [`DialectSet`]:
//!
//! | Group | Applies to |
//! |-------|------------|
//! | External resource / deserialization tokens (`ldap:`, `rmi:`, ...) | always |
//! | Quote followed by a comment marker | always |
//! | Boolean injection shapes (`' or '`, `or 1=1`, `and (exists ...)`) | always; `\|\|` / `&&` operators with MySQL |
//! | Statement shapes (`UNION ... SELECT`, `DROP TABLE`, ...) | always |
//! | Clause keywords and timing calls (`ORDER BY`, `sleep(5)`) | always |
//! | System catalogs and introspection names | per dialect |
//!
//! Patterns match against [`normalize`](super::normalize::normalize)d text.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};

use super::Detector;
use crate::dialect::{Dialect, DialectSet};

const EXTERNAL_RESOURCE: &str = r"ldap:|rmi:|JDBC4Connection|trax\.TemplatesImpl";

const QUOTE_THEN_COMMENT: &str = r#"('|"|;|`)\){0,9}.*( –|--|/\*|#)"#;

/// Boolean shapes when `||` and `&&` are valid operators.
const BOOLEAN_MYSQL: [&str; 6] = [
    r#"('|"|;|`)\){0,9} ?(or|\|\|) ?\({0,9}('|"|;|`)"#,
    r"(or|and|\|\||&&) \({1,3}EXISTS\){1,3}",
    r#"(or|and|\|\||&&) \({0,3}(true|false|1|0|['"`]?[a-z_0-9]+['"`]? ?(>|>=|<|<=|=|==|<>) ?['"`]?[a-z_0-9]+['"`]?|['"`]['"`] ?= ?['"`])"#,
    r"(or|and|\|\||&&) \({0,3}[a-z_0-9]+ between \d+ and \d+",
    r"(or|and|\|\||&&) \({0,3}(username|uname|userid|id|uid|user|full_name|user_name)( ?=| is)",
    r"(or|and|\|\||&&) \({0,3}(username|uname|userid|id|uid|user|full_name|user_name) like ('%|\({0,3}char\(37\))",
];

const BOOLEAN_DEFAULT: [&str; 6] = [
    r#"('|"|;|`)\){0,9} ?or ?\({0,9}('|"|;|`)"#,
    r"(or|and) \({1,3}EXISTS\){1,3}",
    r#"(or|and) \({0,3}(true|false|1|0|['"`]?[a-z_0-9]+['"`]? ?(>|>=|<|<=|=|==|<>) ?['"`]?[a-z_0-9]+['"`]?|['"`]['"`] ?= ?['"`])"#,
    r"(or|and) \({0,3}[a-z_0-9]+ between \d+ and \d+",
    r"(or|and) \({0,3}(username|uname|userid|id|uid|user|full_name|user_name)( ?=| is| in)",
    r"(or|and) \({0,3}(username|uname|userid|id|uid|user|full_name|user_name) like ('%|\({0,3}char\(37\))",
];

const STATEMENTS: [&str; 4] = [
    r"UNION.+?SELECT|SELECT.+?INTO|UPDATE.+?SET|INSERT INTO|(SELECT|DELETE).+?FROM|(CREATE|ALTER|DROP|TRUNCATE)\s+(TABLE|DATABASE|procedure|Function)",
    r"\bselect \({0,3}(\*|count|top|DISTINCT|current_user|session_user|version\(|current_database\(|CHAR\(|bin\()",
    r"\b(call|execute|exec|grant|ORDER BY|group by|CASE WHEN|INNER JOIN|LEFT JOIN|RIGHT JOIN|FULL OUTER JOIN|FULL JOIN|declare|BACKUP)\b",
    r"\bsleep\(\d+\)|\bsleep\(__TIME__\)|\band substring\(password",
];

const MYSQL_CATALOG: [&str; 2] = [
    r"\b(handler|load_file|outfile|benchmark)\b",
    r"\b(INFORMATION_SCHEMA|mysql|performance_schema)\b",
];

const MSSQL_CATALOG: [&str; 2] = [
    r"\b(sp_password|waitfor delay)\b|@@servername|@@microsoftversione|@@version",
    r"\b(master|msdb|mssqlweb|tempdb|sysaltfiles|syscharsets|sysconfigures|syscurconfigs|sysdatabases|syslanguages|syslogins|sysoledbusers|sysprocesses|sysremotelogins|syscolumns|sysconstrains|sysfilegroups|sysfiles|sysforeignkeys|sysindexs|sysmenbers|sysobjects|syspermissions|systypes|sysusers)\b",
];

const PGSQL_CATALOG: [&str; 2] = [
    r"\b(current_setting)\b",
    r"\b(pg_class|pg_shadow|pg_group|pg_sleep)\b",
];

const ORACLE_CATALOG: [&str; 5] = [
    r"\b(dba_users|dba_segments|dba_extents|dba_objects|dba_tablespaces|dba_data_files|dba_temp_files|dba_rollback_segs|dba_ts_quota|dba_free_space|dba_profiles|dba_sys_privs|dba_tab_privs|dba_col_privs|dba_role_privs|dba_audit_trail|dba_stmt_audit_opts|dba_audit_object|dba_audit_session|dba_indexes)\b",
    r"\b(user_objects|user_source|user_segments|user_tables|user_tab_columns|user_constraints|user_sys_privs|user_tab_privs|user_col_privs|user_role_privs|user_indexes|user_ind_columns|user_cons_columns|user_clusters|user_clu_columns|user_cluster_hash_expressions)\b",
    r"\b(v\$database|v\$datafile|v\$controlfile|v\$logfile|v\$instance|v\$log|v\$loghist|v\$sga|v\$parameter|v\$process|v\$bgprocess|v\$controlfile_record_section|v\$thread|v\$datafile_header|v\$archived_log|v\$archive_dest|v\$logmnr_contents|v\$logmnr_dictionary|v\$logmnr_logs|v\$tablespace|v\$tempfile|v\$filestat|v\$undostat|v\$rollname|v\$session|v\$transaction|v\$rollstat|v\$pwfile_users|v\$sqlarea|v\$sql|v\$sysstat)\b",
    r"\b(all_users|all_objects|all_def_audit_opts|all_tables|all_indexes|session_roles|session_privs|index_stats)\b",
    r"\b(tz_offset|to_timestamp_tz|utl_http.request|myappadmin.adduser)\b",
];

const DB2_CATALOG: [&str; 1] = [
    r"\b(sysibm.sysdummy1|syscat.dbauth|syscat.tabauth|sysibm.systables|sysibm.syscolumns|sysibm.sysversions|syscat.schemata)\b",
];

const NOSQL_OPERATORS: [&str; 1] = [r"[\$](where|or|ne|comment)|this.password"];

/// Ordered pattern sources for a dialect set.
pub fn sources(dialects: DialectSet) -> Vec<&'static str> {
    let mut list = vec![EXTERNAL_RESOURCE, QUOTE_THEN_COMMENT];

    if dialects.contains(Dialect::MySql) {
        list.extend(BOOLEAN_MYSQL);
    } else {
        list.extend(BOOLEAN_DEFAULT);
    }

    list.extend(STATEMENTS);

    // MySQL precedes MsSQL here; the order is part of the catalog.
    if dialects.contains(Dialect::MySql) {
        list.extend(MYSQL_CATALOG);
    }
    if dialects.contains(Dialect::MsSql) {
        list.extend(MSSQL_CATALOG);
    }
    if dialects.contains(Dialect::PgSql) {
        list.extend(PGSQL_CATALOG);
    }
    if dialects.contains(Dialect::Oracle) {
        list.extend(ORACLE_CATALOG);
    }
    if dialects.contains(Dialect::Db2) {
        list.extend(DB2_CATALOG);
    }
    if dialects.contains(Dialect::NoSql) {
        list.extend(NOSQL_OPERATORS);
    }

    list
}

/// Compiled, immutable pattern catalog for one [`DialectSet`].
///
/// Safe to share across any number of concurrent requests.
#[derive(Debug)]
pub struct PatternSet {
    dialects: DialectSet,
    patterns: Vec<Regex>,
}

static SHARED: Lazy<RwLock<HashMap<DialectSet, Arc<PatternSet>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

impl PatternSet {
    /// Compile a fresh catalog for `dialects`.
    pub fn compile(dialects: DialectSet) -> Self {
        let patterns = sources(dialects)
            .into_iter()
            .map(|src| {
                RegexBuilder::new(src)
                    .case_insensitive(true)
                    .build()
                    .expect("built-in detection pattern is valid")
            })
            .collect();
        Self { dialects, patterns }
    }

    /// The process-wide catalog for `dialects`, compiled on first use.
    pub fn shared(dialects: DialectSet) -> Arc<Self> {
        if let Some(set) = SHARED
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&dialects)
        {
            return Arc::clone(set);
        }

        let mut cache = SHARED.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            cache
                .entry(dialects)
                .or_insert_with(|| Arc::new(Self::compile(dialects))),
        )
    }

    pub fn dialects(&self) -> DialectSet {
        self.dialects
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Pattern sources in evaluation order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(Regex::as_str)
    }

    /// Index of the first pattern that matches already-normalized `text`.
    pub fn first_match(&self, text: &str) -> Option<usize> {
        self.patterns.iter().position(|re| re.is_match(text))
    }
}

impl Detector for PatternSet {
    fn is_match(&self, normalized: &str) -> bool {
        self.patterns.iter().any(|re| re.is_match(normalized))
    }
}
