use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // 创建 ip_ranges 表
        manager
            .create_table(
                Table::create()
                    .table(IpRange::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(IpRange::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(IpRange::Network).string_len(64).not_null())
                    .col(ColumnDef::new(IpRange::CountryCode).string_len(8).not_null())
                    .col(ColumnDef::new(IpRange::IpVersion).small_integer().not_null())
                    .col(ColumnDef::new(IpRange::PrefixLen).small_integer().not_null())
                    // 定长十六进制，字符串比较即数值比较
                    .col(ColumnDef::new(IpRange::RangeStart).string_len(32).not_null())
                    .col(ColumnDef::new(IpRange::RangeEnd).string_len(32).not_null())
                    .to_owned(),
            )
            .await?;

        // upsert 依赖 network 唯一索引
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_ip_ranges_network")
                    .table(IpRange::Table)
                    .col(IpRange::Network)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // 包含查询索引
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_ip_ranges_lookup")
                    .table(IpRange::Table)
                    .col(IpRange::IpVersion)
                    .col(IpRange::RangeStart)
                    .col(IpRange::RangeEnd)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name("idx_ip_ranges_lookup").to_owned())
            .await?;

        manager
            .drop_index(Index::drop().name("idx_ip_ranges_network").to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(IpRange::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum IpRange {
    #[sea_orm(iden = "ip_ranges")]
    Table,
    Id,
    Network,
    CountryCode,
    IpVersion,
    PrefixLen,
    RangeStart,
    RangeEnd,
}
