use super::*;
use crate::gateway::ErrorBody;

fn status(status: u16, data: ErrorBody) -> GatewayError {
    GatewayError::Status { status, data }
}

#[test]
fn moderation_notice_lists_every_word() {
    let err = status(
        400,
        ErrorBody {
            error: Some("内容包含敏感词".into()),
            found_words: vec!["X".into(), "Y".into()],
            ..ErrorBody::default()
        },
    );
    let notice = Notice::from_gateway_error(&err);
    assert!(notice.is_moderation());
    let text = notice.to_string();
    assert_eq!(text, "存在敏感词: X、Y，请修改");
    assert_ne!(text, Notice::Failure(None).to_string());
}

#[test]
fn failure_prefers_backend_message_then_generic() {
    let err = status(
        400,
        ErrorBody {
            message: Some("用户名已存在".into()),
            ..ErrorBody::default()
        },
    );
    assert_eq!(Notice::from(&err).to_string(), "用户名已存在");

    let err = status(500, ErrorBody::default());
    assert_eq!(Notice::from(&err).to_string(), "请求失败，请稍后重试");
}

#[test]
fn unauthorized_and_network_map_to_their_own_notices() {
    assert_eq!(Notice::from(&status(401, ErrorBody::default())), Notice::SessionExpired);
    let err = GatewayError::Transport(TransportError::Timeout);
    assert_eq!(Notice::from(&err), Notice::Network);
    assert_eq!(Notice::RetryLater("支付".into()).to_string(), "支付未完成，请稍后再试");
}

#[test]
fn filter_finds_first_and_all_words() {
    let filter = SensitiveFilter::from_word_list("赌博\n\n  毒品 \n赌\n赌博").unwrap();
    assert_eq!(filter.len(), 3);
    assert_eq!(filter.first_match("他在赌博和毒品之间"), Some("赌".to_string()));
    assert_eq!(
        filter.find_all("毒品，赌博，毒品"),
        vec!["毒品".to_string(), "赌".to_string(), "赌博".to_string()]
    );
    assert_eq!(filter.first_match("干净的句子"), None);
}

#[test]
fn nested_words_are_reported_and_fully_masked() {
    let filter = SensitiveFilter::new(["敏感", "敏感词"]).unwrap();
    assert_eq!(
        filter.find_all("这是敏感词"),
        vec!["敏感".to_string(), "敏感词".to_string()]
    );
    assert_eq!(filter.mask("这是敏感词"), "这是***");
}

#[test]
fn mask_replaces_matched_characters() {
    let filter = SensitiveFilter::new(["bad", "毒品"]).unwrap();
    assert_eq!(filter.mask("a bad 毒品 day"), "a *** ** day");
    assert_eq!(
        Notice::from_filter(&filter, "毒品"),
        Some(Notice::Moderation(vec!["毒品".to_string()]))
    );
    assert_eq!(Notice::from_filter(&filter, "fine"), None);
}

#[test]
fn empty_filter_matches_nothing() {
    let filter = SensitiveFilter::new(["", "  "]).unwrap();
    assert!(filter.is_empty());
    assert_eq!(filter.first_match("任何内容"), None);
    assert!(filter.find_all("任何内容").is_empty());
    assert_eq!(filter.mask("任何内容"), "任何内容");
}

#[test]
fn filter_loads_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sensitive-words.txt");
    std::fs::write(&path, "alpha\nbeta\n").unwrap();
    let filter = SensitiveFilter::load(&path).unwrap();
    assert_eq!(filter.first_match("xbetax"), Some("beta".to_string()));
    assert!(matches!(
        SensitiveFilter::load(dir.path().join("missing.txt")),
        Err(FilterError::Io(_))
    ));
}

#[test]
fn cleaner_trims_lines_and_enforces_limits() {
    assert_eq!(
        PromptCleaner::clean("  一位年轻女子 \n\n  在阿拉斯加  ").unwrap(),
        "一位年轻女子\n在阿拉斯加"
    );
    assert_eq!(PromptCleaner::clean(" \n\t "), Err(CleanerError::EmptyInput));

    let long = "字".repeat(PromptCleaner::MAX_CHARS + 1);
    assert_eq!(
        PromptCleaner::clean(&long),
        Err(CleanerError::TooLong(PromptCleaner::MAX_CHARS + 1))
    );
    assert!(PromptCleaner::clean(&"字".repeat(PromptCleaner::MAX_CHARS)).is_ok());
}
