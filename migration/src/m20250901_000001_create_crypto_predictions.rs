use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Databases provisioned by hand may already carry this table
        manager
            .create_table(
                Table::create()
                    .table(CryptoPredictions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CryptoPredictions::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(CryptoPredictions::Ds)
                            .timestamp()
                            .not_null(),
                    )
                    .col(ColumnDef::new(CryptoPredictions::Yhat).double().not_null())
                    .col(
                        ColumnDef::new(CryptoPredictions::YhatLower)
                            .double()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CryptoPredictions::YhatUpper)
                            .double()
                            .not_null(),
                    )
                    .col(ColumnDef::new(CryptoPredictions::Symbol).text().not_null())
                    .col(
                        ColumnDef::new(CryptoPredictions::CreatedAt)
                            .timestamp()
                            .not_null()
                            .default(SimpleExpr::Keyword(Keyword::CurrentTimestamp)),
                    )
                    .to_owned(),
            )
            .await?;

        // Retention deletes and "latest forecast" reads both go through symbol + created_at
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_crypto_predictions_symbol_created_at")
                    .table(CryptoPredictions::Table)
                    .col(CryptoPredictions::Symbol)
                    .col(CryptoPredictions::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(CryptoPredictions::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum CryptoPredictions {
    Table,
    Id,
    Ds,
    Yhat,
    YhatLower,
    YhatUpper,
    Symbol,
    CreatedAt,
}
