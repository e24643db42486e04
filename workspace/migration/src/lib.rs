pub use sea_orm_migration::prelude::*;

mod m20240101_000001_create_table;
pub mod entity_iden;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![Box::new(m20240101_000001_create_table::Migration)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use entity_iden::EntityIden;
    use model::entities::prelude::*;
    use sea_orm::Database;

    #[tokio::test]
    async fn test_migration_creates_every_entity_table() {
        let db = Database::connect("sqlite::memory:")
            .await
            .expect("Failed to connect to in-memory database");
        Migrator::up(&db, None).await.expect("Failed to run migrations");

        let manager = SchemaManager::new(&db);
        for table in [User::table(), Case::table(), Composite::table(), Revision::table()] {
            let name = table.to_string();
            assert!(
                manager.has_table(&name).await.expect("has_table failed"),
                "missing table {name}"
            );
        }
        assert!(manager.has_column("revisions", "user_id").await.unwrap());

        Migrator::down(&db, None).await.expect("Failed to roll back migrations");
        assert!(!manager.has_table("users").await.unwrap());
    }
}
