/// 请求处理器
///
/// 每个处理器只做一次列表/读取调用（Gmail 额外按 id 逐条读取，
/// 待办先取第一个任务列表），把结果整理成扁平记录返回
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::RemoteResult;
use crate::google::services::{
    CalendarService, DriveFile, DriveService, EventListQuery, FileListQuery, MailService,
    MessageFormat, MessageListQuery, ProfileService, Task, TaskListQuery, TasksService,
};

pub const NO_SUBJECT: &str = "No Subject";
pub const UNKNOWN_SENDER: &str = "Unknown";
pub const NO_TITLE: &str = "No Title";

/// Dashboard 收件箱条数
const INBOX_LIMIT: u32 = 10;
/// Dashboard 日程条数
const EVENTS_LIMIT: u32 = 10;
/// Dashboard 文件条数
const FILES_PAGE_SIZE: u32 = 12;
/// 会议查询窗口（天）
const MEETINGS_WINDOW_DAYS: i64 = 7;
/// 待办条数
const TASKS_LIMIT: u32 = 20;

const DRIVE_FIELDS: &str =
    "nextPageToken, files(id, name, mimeType, iconLink, webViewLink, thumbnailLink)";

const DOCUMENTS_QUERY: &str = "(mimeType='application/vnd.google-apps.document' \
    or mimeType='application/vnd.google-apps.spreadsheet' \
    or mimeType='application/vnd.google-apps.presentation') and trashed = false";

const DOCUMENTS_FIELDS: &str =
    "files(id, name, mimeType, modifiedTime, iconLink, webViewLink, thumbnailLink)";

/// 脚本输出的邮件摘要
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageSummary {
    pub from: String,
    pub subject: String,
}

/// `/api/gmail` 记录
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageRecord {
    pub id: String,
    pub subject: String,
    pub from: String,
    pub date: String,
    pub snippet: String,
}

/// `/api/calendar` 记录
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventRecord {
    pub id: String,
    pub summary: String,
    pub start: Option<String>,
    #[serde(rename = "htmlLink")]
    pub html_link: Option<String>,
}

/// `/api/meetings` 记录（带视频会议入口的日程）
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeetingRecord {
    pub id: String,
    pub summary: String,
    pub start: Option<String>,
    pub end: Option<String>,
    pub meet_link: Option<String>,
    /// 参会人数
    pub attendees: usize,
}

/// `/api/tasks` 响应：第一个任务列表中的未完成任务
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskBoard {
    pub task_list_id: Option<String>,
    pub tasks: Vec<TaskRecord>,
}

/// `/api/tasks` 中的单条任务，字段原样透传
pub type TaskRecord = Task;

/// `/api/drive`、`/api/documents` 记录，字段原样透传
pub type FileRecord = DriveFile;

/// `/api/profile` 记录，userinfo 原样透传
pub type ProfileRecord = Map<String, Value>;

/// 最近 `limit` 封邮件的发件人和主题（fetch-gmail 脚本）
pub async fn latest_messages<M: MailService + ?Sized>(
    mail: &M,
    limit: u32,
) -> RemoteResult<Vec<MessageSummary>> {
    let query = MessageListQuery {
        max_results: limit,
        label_ids: Vec::new(),
    };

    let mut summaries = Vec::new();
    for message_ref in mail.list_messages(&query).await? {
        let message = mail.get_message(&message_ref.id, MessageFormat::Full).await?;
        summaries.push(MessageSummary {
            // 脚本逐个覆盖，重复 header 以最后一个为准
            from: message.last_header("From").unwrap_or(UNKNOWN_SENDER).to_string(),
            subject: message.last_header("Subject").unwrap_or(NO_SUBJECT).to_string(),
        });
    }

    Ok(summaries)
}

/// 脚本的终端输出
pub fn render_summaries(summaries: &[MessageSummary]) -> String {
    if summaries.is_empty() {
        return "No messages found.".to_string();
    }

    let mut out = String::from("Recent emails:");
    for summary in summaries {
        out.push_str(&format!("\n- From: {} | Subject: {}", summary.from, summary.subject));
    }
    out
}

/// 收件箱最新邮件
pub async fn inbox_messages<M: MailService + ?Sized>(
    mail: &M,
) -> RemoteResult<Vec<MessageRecord>> {
    let query = MessageListQuery {
        max_results: INBOX_LIMIT,
        label_ids: vec!["INBOX".to_string()],
    };

    let mut records = Vec::new();
    for message_ref in mail.list_messages(&query).await? {
        let message = mail
            .get_message(&message_ref.id, MessageFormat::Metadata)
            .await?;

        records.push(MessageRecord {
            subject: message.header("Subject").unwrap_or(NO_SUBJECT).to_string(),
            from: message.header("From").unwrap_or(UNKNOWN_SENDER).to_string(),
            date: message.header("Date").unwrap_or_default().to_string(),
            snippet: message.snippet.clone().unwrap_or_default(),
            id: message_ref.id,
        });
    }

    Ok(records)
}

/// 主日历中 `now` 之后的日程
pub async fn upcoming_events<C: CalendarService + ?Sized>(
    calendar: &C,
    now: DateTime<Utc>,
) -> RemoteResult<Vec<EventRecord>> {
    let query = EventListQuery {
        time_min: now,
        time_max: None,
        max_results: EVENTS_LIMIT,
        single_events: true,
        order_by: "startTime".to_string(),
        conference_data_version: None,
    };

    let events = calendar.list_events("primary", &query).await?;
    Ok(events
        .into_iter()
        .map(|event| EventRecord {
            start: event.start.value().map(str::to_string),
            summary: event.summary.unwrap_or_else(|| NO_TITLE.to_string()),
            id: event.id,
            html_link: event.html_link,
        })
        .collect())
}

/// 未来 7 天内带视频会议入口的日程
pub async fn upcoming_meetings<C: CalendarService + ?Sized>(
    calendar: &C,
    now: DateTime<Utc>,
) -> RemoteResult<Vec<MeetingRecord>> {
    let query = EventListQuery {
        time_min: now,
        time_max: Some(now + Duration::days(MEETINGS_WINDOW_DAYS)),
        max_results: EVENTS_LIMIT,
        single_events: true,
        order_by: "startTime".to_string(),
        conference_data_version: Some(1),
    };

    let events = calendar.list_events("primary", &query).await?;
    Ok(events
        .iter()
        .filter_map(|event| {
            let video = event.video_entry_point()?;
            Some(MeetingRecord {
                id: event.id.clone(),
                summary: event.summary.clone().unwrap_or_else(|| NO_TITLE.to_string()),
                start: event.start.value().map(str::to_string),
                end: event.end.value().map(str::to_string),
                meet_link: video.uri.clone(),
                attendees: event.attendees.len(),
            })
        })
        .collect())
}

/// 最近修改的未删除文件
pub async fn recent_files<D: DriveService + ?Sized>(drive: &D) -> RemoteResult<Vec<FileRecord>> {
    let query = FileListQuery {
        page_size: FILES_PAGE_SIZE,
        q: "trashed = false".to_string(),
        order_by: "modifiedTime desc".to_string(),
        fields: DRIVE_FIELDS.to_string(),
    };

    drive.list_files(&query).await
}

/// 最近修改的文档、表格和幻灯片
pub async fn recent_documents<D: DriveService + ?Sized>(
    drive: &D,
) -> RemoteResult<Vec<FileRecord>> {
    let query = FileListQuery {
        page_size: FILES_PAGE_SIZE,
        q: DOCUMENTS_QUERY.to_string(),
        order_by: "modifiedTime desc".to_string(),
        fields: DOCUMENTS_FIELDS.to_string(),
    };

    drive.list_files(&query).await
}

/// 第一个任务列表中的未完成任务，没有任务列表时返回空
pub async fn task_board<T: TasksService + ?Sized>(tasks: &T) -> RemoteResult<TaskBoard> {
    let Some(list) = tasks.list_task_lists(1).await?.into_iter().next() else {
        return Ok(TaskBoard {
            task_list_id: None,
            tasks: Vec::new(),
        });
    };

    let query = TaskListQuery {
        max_results: TASKS_LIMIT,
        show_completed: false,
    };
    let items = tasks.list_tasks(&list.id, &query).await?;

    Ok(TaskBoard {
        task_list_id: Some(list.id),
        tasks: items,
    })
}

pub async fn profile<P: ProfileService + ?Sized>(profile: &P) -> RemoteResult<ProfileRecord> {
    profile.user_info().await
}
