/// 各资源类别的服务接口
///
/// 处理器只依赖这些 trait，不直接接触 REST 细节
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::RemoteResult;
use crate::google::api::RestClient;

// ---------------------------------------------------------------------------
// Gmail
// ---------------------------------------------------------------------------

/// messages.list 返回的消息引用
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRef {
    pub id: String,
    #[serde(default)]
    pub thread_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct MessageList {
    #[serde(default)]
    messages: Vec<MessageRef>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessageHeader {
    pub name: String,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessagePayload {
    #[serde(default)]
    pub headers: Vec<MessageHeader>,
}

/// messages.get 返回的消息
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Message {
    pub id: String,
    #[serde(default)]
    pub snippet: Option<String>,
    #[serde(default)]
    pub payload: Option<MessagePayload>,
}

impl Message {
    fn headers(&self) -> &[MessageHeader] {
        self.payload
            .as_ref()
            .map(|payload| payload.headers.as_slice())
            .unwrap_or_default()
    }

    /// 按名称查找第一个匹配的 header 值（不区分大小写）
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers()
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }

    /// 同名 header 重复时取最后一个
    pub fn last_header(&self, name: &str) -> Option<&str> {
        self.headers()
            .iter()
            .rev()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageFormat {
    Full,
    Metadata,
}

impl MessageFormat {
    fn as_str(self) -> &'static str {
        match self {
            MessageFormat::Full => "full",
            MessageFormat::Metadata => "metadata",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MessageListQuery {
    pub max_results: u32,
    pub label_ids: Vec<String>,
}

#[async_trait]
pub trait MailService: Send + Sync {
    async fn list_messages(&self, query: &MessageListQuery) -> RemoteResult<Vec<MessageRef>>;

    async fn get_message(&self, id: &str, format: MessageFormat) -> RemoteResult<Message>;
}

pub struct GmailClient {
    rest: RestClient,
}

impl GmailClient {
    pub fn new(rest: RestClient) -> Self {
        Self { rest }
    }
}

#[async_trait]
impl MailService for GmailClient {
    async fn list_messages(&self, query: &MessageListQuery) -> RemoteResult<Vec<MessageRef>> {
        let mut params = vec![("maxResults", query.max_results.to_string())];
        params.extend(query.label_ids.iter().map(|id| ("labelIds", id.clone())));

        let list: MessageList = self.rest.get_json("users/me/messages", &params).await?;
        Ok(list.messages)
    }

    async fn get_message(&self, id: &str, format: MessageFormat) -> RemoteResult<Message> {
        self.rest
            .get_json(
                &format!("users/me/messages/{}", id),
                &[("format", format.as_str().to_string())],
            )
            .await
    }
}

// ---------------------------------------------------------------------------
// Calendar
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventTime {
    #[serde(default)]
    pub date_time: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
}

impl EventTime {
    /// 全天日程只有 date
    pub fn value(&self) -> Option<&str> {
        self.date_time.as_deref().or(self.date.as_deref())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryPoint {
    pub entry_point_type: String,
    #[serde(default)]
    pub uri: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConferenceData {
    #[serde(default)]
    pub entry_points: Vec<EntryPoint>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Attendee {
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub start: EventTime,
    #[serde(default)]
    pub end: EventTime,
    #[serde(default)]
    pub html_link: Option<String>,
    #[serde(default)]
    pub conference_data: Option<ConferenceData>,
    #[serde(default)]
    pub attendees: Vec<Attendee>,
}

impl Event {
    /// 视频会议入口（Meet 链接等）
    pub fn video_entry_point(&self) -> Option<&EntryPoint> {
        self.conference_data
            .as_ref()?
            .entry_points
            .iter()
            .find(|ep| ep.entry_point_type == "video")
    }
}

#[derive(Debug, Default, Deserialize)]
struct EventList {
    #[serde(default)]
    items: Vec<Event>,
}

#[derive(Debug, Clone)]
pub struct EventListQuery {
    pub time_min: DateTime<Utc>,
    pub time_max: Option<DateTime<Utc>>,
    pub max_results: u32,
    pub single_events: bool,
    pub order_by: String,
    /// 设置后响应中带 conferenceData
    pub conference_data_version: Option<u32>,
}

fn rfc3339(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[async_trait]
pub trait CalendarService: Send + Sync {
    async fn list_events(
        &self,
        calendar_id: &str,
        query: &EventListQuery,
    ) -> RemoteResult<Vec<Event>>;
}

pub struct CalendarClient {
    rest: RestClient,
}

impl CalendarClient {
    pub fn new(rest: RestClient) -> Self {
        Self { rest }
    }
}

#[async_trait]
impl CalendarService for CalendarClient {
    async fn list_events(
        &self,
        calendar_id: &str,
        query: &EventListQuery,
    ) -> RemoteResult<Vec<Event>> {
        let mut params = vec![("timeMin", rfc3339(query.time_min))];
        if let Some(time_max) = query.time_max {
            params.push(("timeMax", rfc3339(time_max)));
        }
        params.extend([
            ("maxResults", query.max_results.to_string()),
            ("singleEvents", query.single_events.to_string()),
            ("orderBy", query.order_by.clone()),
        ]);
        if let Some(version) = query.conference_data_version {
            params.push(("conferenceDataVersion", version.to_string()));
        }

        let list: EventList = self
            .rest
            .get_json(&format!("calendars/{}/events", calendar_id), &params)
            .await?;
        Ok(list.items)
    }
}

// ---------------------------------------------------------------------------
// Drive
// ---------------------------------------------------------------------------

/// Drive 文件，字段原样透传，缺失字段不输出
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_view_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_link: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

#[derive(Debug, Clone)]
pub struct FileListQuery {
    pub page_size: u32,
    pub q: String,
    pub order_by: String,
    pub fields: String,
}

#[async_trait]
pub trait DriveService: Send + Sync {
    async fn list_files(&self, query: &FileListQuery) -> RemoteResult<Vec<DriveFile>>;
}

pub struct DriveClient {
    rest: RestClient,
}

impl DriveClient {
    pub fn new(rest: RestClient) -> Self {
        Self { rest }
    }
}

#[async_trait]
impl DriveService for DriveClient {
    async fn list_files(&self, query: &FileListQuery) -> RemoteResult<Vec<DriveFile>> {
        let params = [
            ("pageSize", query.page_size.to_string()),
            ("q", query.q.clone()),
            ("orderBy", query.order_by.clone()),
            ("fields", query.fields.clone()),
        ];

        let list: FileList = self.rest.get_json("files", &params).await?;
        Ok(list.files)
    }
}

// ---------------------------------------------------------------------------
// Profile
// ---------------------------------------------------------------------------

#[async_trait]
pub trait ProfileService: Send + Sync {
    /// 当前用户的 userinfo（原样返回）
    async fn user_info(&self) -> RemoteResult<Map<String, Value>>;
}

pub struct ProfileClient {
    rest: RestClient,
}

impl ProfileClient {
    pub fn new(rest: RestClient) -> Self {
        Self { rest }
    }
}

#[async_trait]
impl ProfileService for ProfileClient {
    async fn user_info(&self) -> RemoteResult<Map<String, Value>> {
        self.rest.get_json("userinfo", &[]).await
    }
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct TaskList {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct TaskListPage {
    #[serde(default)]
    items: Vec<TaskList>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct TaskPage {
    #[serde(default)]
    items: Vec<Task>,
}

#[derive(Debug, Clone, Default)]
pub struct TaskListQuery {
    pub max_results: u32,
    pub show_completed: bool,
}

#[async_trait]
pub trait TasksService: Send + Sync {
    async fn list_task_lists(&self, max_results: u32) -> RemoteResult<Vec<TaskList>>;

    async fn list_tasks(
        &self,
        task_list_id: &str,
        query: &TaskListQuery,
    ) -> RemoteResult<Vec<Task>>;
}

pub struct TasksClient {
    rest: RestClient,
}

impl TasksClient {
    pub fn new(rest: RestClient) -> Self {
        Self { rest }
    }
}

#[async_trait]
impl TasksService for TasksClient {
    async fn list_task_lists(&self, max_results: u32) -> RemoteResult<Vec<TaskList>> {
        let page: TaskListPage = self
            .rest
            .get_json("users/@me/lists", &[("maxResults", max_results.to_string())])
            .await?;
        Ok(page.items)
    }

    async fn list_tasks(
        &self,
        task_list_id: &str,
        query: &TaskListQuery,
    ) -> RemoteResult<Vec<Task>> {
        let params = [
            ("maxResults", query.max_results.to_string()),
            ("showCompleted", query.show_completed.to_string()),
        ];

        let page: TaskPage = self
            .rest
            .get_json(&format!("lists/{}/tasks", task_list_id), &params)
            .await?;
        Ok(page.items)
    }
}
