//! Generic intent mapper
//!
//! The LLM only picks a coarse category ("complaint", "booking", ...). The
//! mapper refines it to a specific intent with ordered keyword rules in
//! English, Malay and Chinese, then runs a second table of corrections
//! that re-map an already specific intent when the wording says the first
//! guess was wrong ("check in" in a message sent after checking out).
//!
//! Both tables are plain data: first matching row wins, and input no row
//! matches passes through unchanged.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

/// One refinement row
struct Rule {
    when: Regex,
    then: &'static str,
}

/// Which intents a correction may rewrite
enum Applies {
    Prefix(&'static str),
    Exact(&'static str),
    Complaints,
}

impl Applies {
    fn covers(&self, intent: &str) -> bool {
        match self {
            Self::Prefix(prefix) => intent.starts_with(prefix),
            Self::Exact(name) => intent == *name,
            Self::Complaints => intent == "complaint" || intent.ends_with("_complaint"),
        }
    }
}

/// One correction row; every cue must match
struct Correction {
    applies: Applies,
    cues: Vec<Regex>,
    then: &'static str,
}

fn re(pattern: &str) -> Regex {
    // Table patterns are literals covered by tests
    Regex::new(pattern).unwrap_or_else(|e| panic!("invalid mapper pattern {}: {}", pattern, e))
}

fn rule(pattern: &str, then: &'static str) -> Rule {
    Rule { when: re(pattern), then }
}

static HUMAN_REQUEST: &str =
    r"(?i)\b(human|real person|talk to (someone|staff|a person)|speak to (someone|staff|a person)|manager|manusia|orang sebenar|bercakap dengan staf)\b|人工|真人|客服|找经理";

static INFANT: &str = r"(?i)\b(baby|babies|infant|toddler|newborn|bayi|budak kecil)\b|婴儿|宝宝|小孩";

static POST_CHECKOUT: &str =
    r"(?i)\b(after (i |we )?check(ed)?[ -]?out|already checked[ -]?out|just checked[ -]?out|checked[ -]?out (this|yesterday|today)|lepas check[ -]?out|sudah check[ -]?out|dah check[ -]?out)\b|退房后|已经退房|退房了";

static LEFT_BEHIND: &str =
    r"(?i)\b(left (my|behind|it)|forgot|forgotten|lost|tertinggal|terlupa|hilang)\b|落下|忘了|忘记|丢了";

static REVIEW: &str =
    r"(?i)\b(review|rating|rated|stars?|feedback|tripadvisor|google maps|booking\.com|ulasan|penilaian|bintang)\b|评价|好评|差评|评论";

static REFINEMENTS: Lazy<HashMap<&'static str, Vec<Rule>>> = Lazy::new(|| {
    HashMap::from([
        (
            "complaint",
            vec![
                rule(r"(?i)\b(noise|noisy|loud|snor(e|ing)|party|bising|kuat)\b|吵|噪音|太大声", "noise_complaint"),
                rule(r"(?i)\b(dirty|smell(s|y)?|stink|bed ?bugs?|cockroach(es)?|hair|stain(ed)?|kotor|bau|pepijat|lipas)\b|脏|臭|蟑螂|臭虫", "cleanliness_complaint"),
                rule(r"(?i)\b(broken|not working|doesn'?t work|aircon|air[- ]?con|shower|hot water|leak(ing)?|rosak|tak berfungsi|bocor)\b|坏了|没有热水|漏水|空调", "facility_complaint"),
                rule(r"(?i)\b(rude|unfriendly|staff|receptionist|biadap|kurang ajar)\b|态度|服务员|前台", "staff_complaint"),
            ],
        ),
        (
            "booking",
            vec![
                rule(r"(?i)\b(group|\d+\s*(people|pax|persons|guests|orang)|rombongan)\b|\d+\s*(个人|位)|团体", "group_booking"),
                rule(r"(?i)\b(cancel(l?ation)?|batal(kan)?)\b|取消", "booking_cancellation"),
                rule(r"(?i)\b(change|modify|extend|reschedule|tukar|lanjut(kan)?)\b|改|延长", "booking_modification"),
                rule(r"(?i)\b(available|availability|vacan(cy|t)|any (room|bed)s?|kosong|ada bilik)\b|有房|空房|还有位", "availability"),
            ],
        ),
        (
            "directions",
            vec![
                rule(r"(?i)\b(airport|klia2?|lapangan terbang)\b|机场", "directions_airport"),
                rule(r"(?i)\b(bus|train|lrt|mrt|monorail|grab|taxi|teksi|station|stesen)\b|地铁|巴士|火车|出租车", "directions_transport"),
            ],
        ),
        (
            "facilities",
            vec![
                rule(r"(?i)\b(wi-?fi|internet|password|kata laluan)\b|无线|网络|密码", "wifi"),
                rule(r"(?i)\b(laundry|washing|wash (my )?clothes|dryer|dobi|basuh)\b|洗衣", "laundry"),
                rule(r"(?i)\b(kitchen|cook(ing)?|microwave|fridge|dapur|masak)\b|厨房|做饭|冰箱", "kitchen"),
                rule(r"(?i)\b(parking|car ?park|park (my|the) car|letak kereta|tempat letak)\b|停车", "parking"),
                rule(r"(?i)\b(lockers?|loker)\b|储物柜|柜子", "locker"),
                rule(r"(?i)\b(towels?|tuala)\b|毛巾", "towel"),
            ],
        ),
        (
            "rules",
            vec![
                rule(r"(?i)\b(quiet|quiet hours|curfew|waktu senyap)\b|安静|宵禁", "quiet_hours"),
                rule(r"(?i)\b(smok(e|ing)|vape|vaping|merokok|rokok)\b|吸烟|抽烟", "smoking_policy"),
                rule(r"(?i)\b(visitors?|friends? (come|visit)|pelawat)\b|访客|朋友来", "visitor_policy"),
                rule(r"(?i)\b(pets?|dogs?|cats?|haiwan)\b|宠物|狗|猫", "pet_policy"),
                rule(INFANT, "infant_policy"),
            ],
        ),
        (
            "payment",
            vec![
                rule(r"(?i)\b(refund|bayaran balik|pulangkan wang)\b|退款|退钱", "refund"),
                rule(r"(?i)\b(deposit|cagaran)\b|押金", "deposit"),
                rule(r"(?i)\b(card|cash|credit|debit|duitnow|touch ?n ?go|tng|e-?wallet|tunai|kad)\b|现金|刷卡|信用卡|支付宝|微信支付", "payment_methods"),
                rule(r"(?i)\b(price|cost|how much|rate|berapa|harga)\b|多少钱|价格|价钱", "pricing"),
            ],
        ),
        (
            "checkin",
            vec![
                rule(r"(?i)\b(early|earlier|awal)\b|提前|早点", "early_checkin"),
                rule(r"(?i)\b(what time|when|time|pukul berapa|bila|jam)\b|几点|什么时候|时间", "checkin_time"),
                rule(r"(?i)\b(late|night|midnight|lewat|malam)\b|晚到|深夜|半夜", "late_arrival"),
            ],
        ),
        (
            "checkout",
            vec![
                rule(r"(?i)\b(late|extend|later|lewat)\b|延迟|晚点", "late_checkout"),
                rule(r"(?i)\b(luggage|bags?|baggage|beg|bagasi)\b|行李", "luggage_storage"),
                rule(r"(?i)\b(what time|when|time|pukul berapa|bila|jam)\b|几点|什么时候|时间", "checkout_time"),
            ],
        ),
        (
            "general",
            vec![
                rule(HUMAN_REQUEST, "human_request"),
                rule(LEFT_BEHIND, "lost_item"),
                rule(r"(?i)\b(hi|hello|hey|good (morning|afternoon|evening)|selamat (pagi|petang|malam)|hai)\b|你好|您好|早上好", "greeting"),
                rule(r"(?i)\b(thanks?|thank you|terima kasih|tq)\b|谢谢|多谢", "thanks"),
            ],
        ),
        ("unknown", vec![rule(HUMAN_REQUEST, "human_request")]),
    ])
});

static CORRECTIONS: Lazy<Vec<Correction>> = Lazy::new(|| {
    vec![
        Correction {
            applies: Applies::Prefix("checkin"),
            cues: vec![re(POST_CHECKOUT), re(LEFT_BEHIND)],
            then: "lost_item",
        },
        Correction {
            applies: Applies::Prefix("checkin"),
            cues: vec![re(POST_CHECKOUT)],
            then: "post_checkout_complaint",
        },
        Correction {
            applies: Applies::Complaints,
            cues: vec![re(REVIEW)],
            then: "review_feedback",
        },
        Correction {
            applies: Applies::Exact("noise_complaint"),
            cues: vec![re(INFANT)],
            then: "infant_policy",
        },
    ]
});

/// Lowercase, trimmed, `snake_case` form of a model-supplied category
fn normalize_category(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .replace(['-', ' '], "_")
}

/// Coarse category to specific intent, plus false-positive corrections
#[derive(Debug, Clone, Copy, Default)]
pub struct GenericIntentMapper;

impl GenericIntentMapper {
    pub fn new() -> Self {
        Self
    }

    /// Full mapping: refine, then correct
    pub fn map(&self, raw: &str, text: &str) -> String {
        let refined = self.refine(raw, text);
        match self.correct(&refined, text) {
            Some(corrected) => corrected.to_string(),
            None => refined,
        }
    }

    /// First refinement rule of the coarse category that matches `text`
    pub fn refine(&self, raw: &str, text: &str) -> String {
        let category = normalize_category(raw);
        REFINEMENTS
            .get(category.as_str())
            .and_then(|rules| rules.iter().find(|r| r.when.is_match(text)))
            .map(|r| r.then.to_string())
            .unwrap_or(category)
    }

    /// Replacement intent when wording contradicts `intent`
    pub fn correct(&self, intent: &str, text: &str) -> Option<&'static str> {
        CORRECTIONS
            .iter()
            .find(|c| c.applies.covers(intent) && c.cues.iter().all(|cue| cue.is_match(text)))
            .map(|c| {
                tracing::debug!(from = intent, to = c.then, "Intent corrected");
                c.then
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refinement_table() {
        let mapper = GenericIntentMapper::new();
        let cases = [
            ("complaint", "the room next door is so noisy", "noise_complaint"),
            ("complaint", "bilik sangat kotor", "cleanliness_complaint"),
            ("complaint", "空调坏了", "facility_complaint"),
            ("booking", "we are 8 people next friday", "group_booking"),
            ("booking", "please cancel my booking", "booking_cancellation"),
            ("directions", "how to get here from KLIA2", "directions_airport"),
            ("directions", "nearest LRT station?", "directions_transport"),
            ("facilities", "what's the wifi password", "wifi"),
            ("facilities", "ada dobi tak?", "laundry"),
            ("rules", "can I smoke in the room", "smoking_policy"),
            ("payment", "can I pay by card", "payment_methods"),
            ("payment", "how much per night", "pricing"),
            ("checkin", "can I check in early", "early_checkin"),
            ("checkin", "几点可以入住", "checkin_time"),
            ("checkout", "can I have a late checkout", "late_checkout"),
            ("checkout", "can I leave my luggage after checkout", "luggage_storage"),
            ("general", "I want to talk to a real person", "human_request"),
            ("unknown", "人工客服", "human_request"),
        ];

        for (raw, text, expected) in cases {
            assert_eq!(mapper.map(raw, text), expected, "{} / {}", raw, text);
        }
    }

    #[test]
    fn test_unmatched_passes_through() {
        let mapper = GenericIntentMapper::new();
        assert_eq!(mapper.map("booking", "hmm"), "booking");
        assert_eq!(mapper.map("wifi", "anything"), "wifi");
        assert_eq!(mapper.map("unknown", "asdf"), "unknown");
    }

    #[test]
    fn test_category_normalized() {
        let mapper = GenericIntentMapper::new();
        assert_eq!(mapper.map(" Check-In ", "nothing specific"), "check_in");
        assert_eq!(mapper.map("COMPLAINT", "so loud at night"), "noise_complaint");
    }

    #[test]
    fn test_post_checkout_corrections() {
        let mapper = GenericIntentMapper::new();
        assert_eq!(
            mapper.correct("checkin_time", "I already checked out but was charged twice"),
            Some("post_checkout_complaint")
        );
        assert_eq!(
            mapper.correct("checkin_info", "after I checked out I realised I left my charger"),
            Some("lost_item")
        );
        assert_eq!(mapper.correct("checkin_time", "what time is check in"), None);
    }

    #[test]
    fn test_review_correction() {
        let mapper = GenericIntentMapper::new();
        assert_eq!(
            mapper.map("complaint", "the room was dirty, I'll leave a 1 star review"),
            "review_feedback"
        );
        assert_eq!(mapper.correct("wifi", "great wifi, 5 stars"), None);
    }

    #[test]
    fn test_infant_correction() {
        let mapper = GenericIntentMapper::new();
        assert_eq!(
            mapper.map("complaint", "will my baby be too noisy for the dorm"),
            "infant_policy"
        );
    }

    #[test]
    fn test_pure() {
        let mapper = GenericIntentMapper::new();
        let text = "the room is noisy";
        assert_eq!(mapper.map("complaint", text), mapper.map("complaint", text));
    }

    #[test]
    fn test_all_patterns_compile() {
        Lazy::force(&REFINEMENTS);
        Lazy::force(&CORRECTIONS);
    }
}
