//! 片库请求 DTO

use serde::Deserialize;
use validator::Validate;

use cinetrack_shared::events::ItemType;

/// 加入待看清单 / 收藏请求
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AddLibraryItemRequest {
    #[validate(length(min = 1, max = 64, message = "用户ID长度必须在1-64个字符之间"))]
    pub user_id: String,
    #[validate(length(min = 1, max = 64, message = "条目ID长度必须在1-64个字符之间"))]
    pub item_id: String,
    pub item_type: ItemType,
    #[validate(length(min = 1, max = 200, message = "标题长度必须在1-200个字符之间"))]
    pub item_title: String,
}

/// 发表影评请求
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SubmitReviewRequest {
    #[validate(length(min = 1, max = 64, message = "用户ID长度必须在1-64个字符之间"))]
    pub user_id: String,
    #[validate(length(min = 1, max = 64, message = "条目ID长度必须在1-64个字符之间"))]
    pub item_id: String,
    pub item_type: ItemType,
    #[validate(length(min = 1, max = 200, message = "标题长度必须在1-200个字符之间"))]
    pub item_title: String,
    #[validate(range(min = 1, max = 10, message = "评分必须在1-10之间"))]
    pub rating: i16,
    #[validate(length(max = 5000, message = "影评内容不能超过5000个字符"))]
    #[serde(default)]
    pub content: String,
}

/// 记录观看请求
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RecordWatchRequest {
    #[validate(length(min = 1, max = 64, message = "用户ID长度必须在1-64个字符之间"))]
    pub user_id: String,
    #[validate(length(min = 1, max = 64, message = "条目ID长度必须在1-64个字符之间"))]
    pub item_id: String,
    pub item_type: ItemType,
}
