use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

/// Tables read by the monitor. In deployed environments the sending
/// pipeline owns them; this migration provisions local and test databases.
#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(NlSend::Table)
                    .if_not_exists()
                    .col(string(NlSend::Id).primary_key())
                    .col(string(NlSend::LetterId))
                    .col(timestamp_with_time_zone(NlSend::ScheduledSendTime))
                    .col(
                        big_integer(NlSend::StatusWaitTimestamp)
                            .comment("Unix milliseconds"),
                    )
                    .col(timestamp_with_time_zone_null(NlSend::StatusDoneTimestamp))
                    .col(big_integer(NlSend::MetricsSentEmails).default(0))
                    .col(big_integer(NlSend::MetricsSentEmailsErr).default(0))
                    .col(big_integer(NlSend::TotalSendSize))
                    .col(
                        string_len_null(NlSend::SendState, 16)
                            .comment("'done', 'warning' or 'alarm'; written by carta-monitor"),
                    )
                    .col(integer(NlSend::QueueTag))
                    .col(boolean_null(NlSend::Personalize))
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_nl_send_status_wait_timestamp")
                    .table(NlSend::Table)
                    .col(NlSend::StatusWaitTimestamp)
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_nl_send_category_done")
                    .table(NlSend::Table)
                    .col(NlSend::QueueTag)
                    .col(NlSend::Personalize)
                    .col(NlSend::StatusDoneTimestamp)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(LmLists::Table)
                    .if_not_exists()
                    .col(pk_auto(LmLists::Id).big_integer())
                    .col(string(LmLists::Name))
                    .col(string(LmLists::Type))
                    .col(boolean(LmLists::Enabled).default(true))
                    .col(boolean(LmLists::Autorun).default(false))
                    .col(
                        string_len_null(LmLists::AutorunTime, 4)
                            .comment("HHmm in the list scheduler's clock"),
                    )
                    .col(text_null(LmLists::Message))
                    .col(timestamp_with_time_zone(LmLists::UpdatedTime))
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_lm_lists_updated_time")
                    .table(LmLists::Table)
                    .col(LmLists::UpdatedTime)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(FileDownloadDetails::Table)
                    .if_not_exists()
                    .col(pk_auto(FileDownloadDetails::Id).big_integer())
                    .col(string(FileDownloadDetails::ListName))
                    .col(string(FileDownloadDetails::UserName))
                    .col(string(FileDownloadDetails::Status))
                    .col(timestamp_with_time_zone(FileDownloadDetails::CreatedTime))
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_file_download_details_status_created")
                    .table(FileDownloadDetails::Table)
                    .col(FileDownloadDetails::Status)
                    .col(FileDownloadDetails::CreatedTime)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Events::Table)
                    .if_not_exists()
                    .col(pk_auto(Events::Id).big_integer())
                    .col(string(Events::EventType))
                    .col(
                        timestamp_with_time_zone(Events::CreatedTime)
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Events::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(FileDownloadDetails::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(LmLists::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(NlSend::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum NlSend {
    Table,
    Id,
    LetterId,
    ScheduledSendTime,
    StatusWaitTimestamp,
    StatusDoneTimestamp,
    MetricsSentEmails,
    MetricsSentEmailsErr,
    TotalSendSize,
    SendState,
    QueueTag,
    Personalize,
}

#[derive(Iden)]
pub enum LmLists {
    Table,
    Id,
    Name,
    Type,
    Enabled,
    Autorun,
    AutorunTime,
    Message,
    UpdatedTime,
}

#[derive(Iden)]
pub enum FileDownloadDetails {
    Table,
    Id,
    ListName,
    UserName,
    Status,
    CreatedTime,
}

#[derive(Iden)]
pub enum Events {
    Table,
    Id,
    EventType,
    CreatedTime,
}
