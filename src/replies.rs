use rand::seq::SliceRandom;
use rand::Rng;

/// Bot name token, matched against lowercased text.
pub const NAME_KEYWORD: &str = "滷小 small";
pub const TASK_KEYWORD: &str = "任務";
pub const FOOD_KEYWORDS: [&str; 2] = ["吃飯", "滷肉飯"];

pub const GREETING_REPLY: &str = "我是滷小 SMALL！今天要一起完成什麼任務呢？😋 快告訴我吧～🍖";
pub const TASK_REPLY: &str =
    "今天的任務是：吃一碗滷肉飯，然後告訴滷小 SMALL 你有多開心！🍚 你完成了嗎？😉";
pub const FOOD_REPLY: &str =
    "哇！你提到滷肉飯了！🍲 滷小 SMALL 也想吃～你今天吃的滷肉飯好吃嗎？😋";
pub const FALLBACK_REPLY: &str =
    "滷小 SMALL 聽不懂啦～請說『滷小 SMALL』、『任務』或『滷肉飯』來跟我互動吧！🍖";

/// Pool the scheduled broadcast draws from.
pub const FUNNY_MESSAGES: [&str; 5] = [
    "滷小 SMALL 碎碎念：今天有沒有吃滷肉飯呀？🍚 快去完成任務，晚上有驚喜哦！😉",
    "滷小 SMALL 情勒時間：你今天有沒有偷懶呀？😏 快去完成任務，不然滷肉飯不給你吃！🍖",
    "滷小 SMALL 提醒你：滷肉飯的香味在呼喚你～🍲 快去完成任務，我幫你留一份！😋",
    "滷小 SMALL 碎碎念：今天天氣好適合吃滷肉飯！🌞 完成任務後一起去吃吧～🍚",
    "滷小 SMALL 情勒你：別一直滑手機啦！📱 快去完成任務，不然滷小 SMALL 要生氣了！😤",
];

/// Which canned reply a message falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyKind {
    Greeting,
    Task,
    Food,
    Fallback,
}

impl ReplyKind {
    pub fn text(self) -> &'static str {
        match self {
            ReplyKind::Greeting => GREETING_REPLY,
            ReplyKind::Task => TASK_REPLY,
            ReplyKind::Food => FOOD_REPLY,
            ReplyKind::Fallback => FALLBACK_REPLY,
        }
    }
}

/// Classify a message. Rules are checked in order and the first hit wins.
pub fn classify(text: &str) -> ReplyKind {
    let text = text.to_lowercase();
    if text.contains(NAME_KEYWORD) {
        ReplyKind::Greeting
    } else if text.contains(TASK_KEYWORD) {
        ReplyKind::Task
    } else if FOOD_KEYWORDS.iter().any(|k| text.contains(k)) {
        ReplyKind::Food
    } else {
        ReplyKind::Fallback
    }
}

pub fn reply_for(text: &str) -> &'static str {
    classify(text).text()
}

/// Pick one broadcast message uniformly at random.
pub fn pick_funny_message<R: Rng + ?Sized>(rng: &mut R) -> &'static str {
    // The pool is a non-empty constant.
    FUNNY_MESSAGES.choose(rng).copied().unwrap_or(FUNNY_MESSAGES[0])
}
