use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::{EntityTrait, Schema};

use crate::entity::{AuditLogs, CartItems, OrderItems, Orders, Products, Users, cart_items};

#[derive(DeriveMigrationName)]
pub struct Migration;

impl Migration {
    async fn create_table_for<E>(manager: &SchemaManager<'_>, entity: E) -> Result<(), DbErr>
    where
        E: EntityTrait,
    {
        let schema = Schema::new(manager.get_database_backend());
        manager
            .create_table(schema.create_table_from_entity(entity).if_not_exists().to_owned())
            .await
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Referenced tables first.
        Self::create_table_for(manager, Users).await?;
        Self::create_table_for(manager, Products).await?;
        Self::create_table_for(manager, CartItems).await?;
        Self::create_table_for(manager, Orders).await?;
        Self::create_table_for(manager, OrderItems).await?;
        Self::create_table_for(manager, AuditLogs).await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_cart_items_user_product")
                    .table(CartItems)
                    .col(cart_items::Column::UserId)
                    .col(cart_items::Column::ProductId)
                    .unique()
                    .if_not_exists()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(AuditLogs).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(OrderItems).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Orders).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(CartItems).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Products).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users).if_exists().to_owned())
            .await
    }
}
