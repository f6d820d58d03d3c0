//! Tests against a live MySQL server.
//!
//! Run with `DATABASE_URL=mysql://... cargo test -p myslice-mysql -- --ignored`.

use myslice_core::{Catalog, DumpHeader, KeySet, QueryExecutor, SchemaSource, Select};
use myslice_mysql::{MySqlConfig, MySqlSource};

fn setup() -> MySqlSource {
    let config = MySqlConfig::from_env().unwrap();
    let source = MySqlSource::connect(&config).unwrap();
    for sql in [
        "DROP TABLE IF EXISTS `slice_member`",
        "DROP TABLE IF EXISTS `slice_org`",
        "CREATE TABLE `slice_org` (`id` int NOT NULL, `name` varchar(40) NOT NULL, PRIMARY KEY (`id`))",
        "CREATE TABLE `slice_member` (`id` int NOT NULL, `org_id` int NOT NULL, PRIMARY KEY (`id`), \
         CONSTRAINT `slice_member_org` FOREIGN KEY (`org_id`) REFERENCES `slice_org` (`id`))",
        "INSERT INTO `slice_org` VALUES (1,'Acme'),(2,'O''Neil')",
        "INSERT INTO `slice_member` VALUES (10,1),(11,2)",
    ] {
        source.run(sql).unwrap();
    }
    source
}

#[test]
#[ignore = "needs DATABASE_URL pointing at a scratch MySQL database"]
fn test_slice_live_database() {
    let source = setup();
    assert!(source.max_allowed_packet().unwrap() > 1000);
    assert!(source
        .list_tables()
        .unwrap()
        .contains(&"slice_member".to_string()));

    let mut names = Vec::new();
    source
        .select_each(&Select::columns("slice_org", ["name", "id"]), &mut |row| {
            names.push(row.get_str(0).unwrap_or_default().into_owned());
            Ok(())
        })
        .unwrap();
    names.sort();
    assert_eq!(names, ["Acme", "O'Neil"]);

    let mut catalog = Catalog::new("live");
    catalog.parse_tables(&source).unwrap();

    source.begin_snapshot().unwrap();
    let org = catalog.table_id("slice_org").unwrap();
    catalog
        .limit_pks(&source, org, &KeySet::from([2]), "live test")
        .unwrap();

    let member = catalog.table_by_name("slice_member").unwrap();
    assert_eq!(member.retained_pks(), Some(&KeySet::from([11])));

    let mut out = Vec::new();
    catalog
        .dump(&source, &DumpHeader::new("live", "live"), &mut out)
        .unwrap();
    source.rollback().unwrap();
    source.close().unwrap();

    let dump = String::from_utf8(out).unwrap();
    assert!(dump.contains("INSERT INTO `slice_org` VALUES\n(2,'O\\'Neil');"));
    assert!(dump.contains("INSERT INTO `slice_member` VALUES\n(11,2);"));
}
