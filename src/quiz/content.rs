use std::sync::Arc;

use chrono::{Datelike, NaiveDate};
use tracing::{info, instrument, warn};

use super::model::{DailyContent, Passage, PassageType, SessionQuestion};
use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentRequest {
    pub grade: i64,
    pub semester: i64,
    pub date: NaiveDate,
}

/// Something that can produce a day's passages and questions.
#[rocket::async_trait]
pub trait ContentSource: Send + Sync {
    fn name(&self) -> &'static str;

    async fn generate(&self, request: &ContentRequest) -> Result<DailyContent, AppError>;
}

/// Serves the configured source and substitutes the built-in set whenever it
/// fails or hands back content that cannot be played.
pub struct ContentProvider {
    primary: Option<Arc<dyn ContentSource>>,
    fallback: FallbackContent,
}

impl ContentProvider {
    pub fn fallback_only() -> Self {
        Self {
            primary: None,
            fallback: FallbackContent,
        }
    }

    pub fn with_primary(source: Arc<dyn ContentSource>) -> Self {
        Self {
            primary: Some(source),
            fallback: FallbackContent,
        }
    }

    #[instrument(skip(self))]
    pub async fn daily_content(&self, request: &ContentRequest) -> DailyContent {
        if let Some(source) = &self.primary {
            match source.generate(request).await {
                Ok(content) => match content.validate() {
                    Ok(()) => {
                        info!(source = source.name(), "Generated daily content");
                        return content;
                    }
                    Err(e) => {
                        warn!(source = source.name(), error = %e, "Generated content is malformed, using fallback");
                    }
                },
                Err(e) => {
                    warn!(source = source.name(), error = %e, "Content generation failed, using fallback");
                }
            }
        }

        self.fallback.content_for(request)
    }
}

/// Fixture passages rotated by date.
pub struct FallbackContent;

#[rocket::async_trait]
impl ContentSource for FallbackContent {
    fn name(&self) -> &'static str {
        "fallback"
    }

    async fn generate(&self, request: &ContentRequest) -> Result<DailyContent, AppError> {
        Ok(self.content_for(request))
    }
}

impl FallbackContent {
    pub const SET_COUNT: usize = 3;

    pub fn content_for(&self, request: &ContentRequest) -> DailyContent {
        let index = request.date.num_days_from_ce().rem_euclid(Self::SET_COUNT as i32) as usize;
        match index {
            0 => set_seasons(),
            1 => set_market(),
            _ => set_library(),
        }
    }
}

fn options(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn question(
    id: &str,
    text: &str,
    choices: &[&str],
    correct: usize,
    explanation: &str,
    wrong: &[&str],
) -> SessionQuestion {
    SessionQuestion::new(id, text, options(choices), correct, explanation, options(wrong))
}

fn passage(
    id: &str,
    passage_type: PassageType,
    title: &str,
    author: Option<&str>,
    content: &str,
    questions: Vec<SessionQuestion>,
) -> Passage {
    Passage {
        id: id.to_string(),
        passage_type,
        title: title.to_string(),
        author: author.map(str::to_string),
        content: content.to_string(),
        questions,
    }
}

fn set_seasons() -> DailyContent {
    DailyContent {
        passages: vec![
            passage(
                "seasons-nf",
                PassageType::Nonfiction,
                "우리나라의 사계절",
                None,
                "우리나라는 봄, 여름, 가을, 겨울의 네 계절이 뚜렷합니다. 봄에는 꽃이 피고 \
                 날씨가 따뜻해집니다. 여름에는 비가 많이 오고 덥습니다. 가을에는 곡식이 \
                 익고 단풍이 듭니다. 겨울에는 춥고 눈이 내립니다.",
                vec![
                    question(
                        "seasons-nf-1",
                        "이 글의 중심 내용은 무엇인가요?",
                        &["우리나라는 네 계절이 뚜렷하다", "여름에는 비가 많이 온다", "겨울에는 눈이 내린다", "가을에는 단풍이 든다"],
                        0,
                        "글 전체가 네 계절의 특징을 차례로 설명하고 있어요.",
                        &["", "여름에 대한 한 부분의 내용이에요.", "겨울에 대한 한 부분의 내용이에요.", "가을에 대한 한 부분의 내용이에요."],
                    ),
                    question(
                        "seasons-nf-2",
                        "곡식이 익는 계절은 언제인가요?",
                        &["봄", "여름", "가을", "겨울"],
                        2,
                        "'가을에는 곡식이 익고'라고 나와 있어요.",
                        &["봄에는 꽃이 피어요.", "여름에는 비가 많이 와요.", "", "겨울에는 눈이 내려요."],
                    ),
                ],
            ),
            passage(
                "seasons-fi",
                PassageType::Fiction,
                "눈사람 친구",
                None,
                "첫눈이 내린 아침, 민지는 동생과 함께 마당에 눈사람을 만들었습니다. \
                 민지는 목도리를 벗어 눈사람에게 둘러 주며 \"춥지 않게 해 줄게.\" 하고 \
                 웃었습니다.",
                vec![question(
                    "seasons-fi-1",
                    "민지가 눈사람에게 목도리를 둘러 준 까닭은 무엇인가요?",
                    &["눈사람이 춥지 않기를 바라서", "목도리가 싫어서", "동생이 시켜서", "눈사람을 꾸미기 위해서"],
                    0,
                    "\"춥지 않게 해 줄게.\"라는 말에서 민지의 마음을 알 수 있어요.",
                    &["", "목도리가 싫다는 내용은 없어요.", "동생이 시켰다는 내용은 없어요.", "꾸미려는 마음보다 걱정하는 마음이 드러나요."],
                )],
            ),
            passage(
                "seasons-po",
                PassageType::Poetry,
                "봄비",
                None,
                "톡톡톡 봄비가\n창문을 두드려요\n일어나라 일어나라\n새싹을 깨워요",
                vec![question(
                    "seasons-po-1",
                    "이 시에서 봄비가 하는 일로 표현된 것은 무엇인가요?",
                    &["새싹을 깨운다", "꽃을 꺾는다", "바람을 부른다", "햇볕을 가린다"],
                    0,
                    "'새싹을 깨워요'에서 봄비를 사람처럼 표현했어요.",
                    &["", "꽃을 꺾는다는 표현은 없어요.", "바람은 나오지 않아요.", "햇볕은 나오지 않아요."],
                )],
            ),
        ],
        grammar_questions: vec![
            question(
                "seasons-gr-1",
                "맞춤법이 바른 것은 무엇인가요?",
                &["어떡해", "어떻해", "어떠캐", "어떻게해"],
                0,
                "'어떻게 해'가 줄어든 말은 '어떡해'로 써요.",
                &["", "'어떻해'는 틀린 표기예요.", "소리 나는 대로 쓴 틀린 표기예요.", "줄여 쓸 때는 '어떡해'예요."],
            ),
            question(
                "seasons-gr-2",
                "'눈'이 하늘에서 내리는 것을 뜻하는 문장은 무엇인가요?",
                &["눈이 아파요", "눈이 펑펑 내려요", "눈을 감아요", "눈이 커요"],
                1,
                "하늘에서 내리는 눈은 '펑펑 내려요'와 어울려요.",
                &["몸의 눈을 뜻해요.", "", "몸의 눈을 뜻해요.", "몸의 눈을 뜻해요."],
            ),
        ],
    }
}

fn set_market() -> DailyContent {
    DailyContent {
        passages: vec![
            passage(
                "market-nf",
                PassageType::Nonfiction,
                "전통 시장",
                None,
                "전통 시장에는 여러 가게가 모여 있습니다. 사람들은 채소, 생선, 옷 등 \
                 필요한 물건을 삽니다. 상인과 손님이 값을 이야기하며 정을 나누기도 합니다.",
                vec![
                    question(
                        "market-nf-1",
                        "전통 시장에서 사람들이 하는 일은 무엇인가요?",
                        &["필요한 물건을 산다", "영화를 본다", "운동을 한다", "책을 빌린다"],
                        0,
                        "'필요한 물건을 삽니다'라고 나와 있어요.",
                        &["", "영화는 나오지 않아요.", "운동은 나오지 않아요.", "책을 빌리는 곳은 도서관이에요."],
                    ),
                    question(
                        "market-nf-2",
                        "상인과 손님이 값을 이야기하며 나누는 것은 무엇인가요?",
                        &["물건", "정", "돈", "자리"],
                        1,
                        "'정을 나누기도 합니다'라고 나와 있어요.",
                        &["물건은 사고파는 것이에요.", "", "돈을 나눈다는 내용은 없어요.", "자리는 나오지 않아요."],
                    ),
                ],
            ),
            passage(
                "market-fi",
                PassageType::Fiction,
                "할머니의 떡",
                None,
                "준호는 시장에서 떡을 파는 할머니를 도와 드렸습니다. 할머니는 고맙다며 \
                 따끈한 떡 한 봉지를 주셨습니다. 준호는 집에 가서 가족과 나누어 먹었습니다.",
                vec![question(
                    "market-fi-1",
                    "할머니가 준호에게 떡을 주신 까닭은 무엇인가요?",
                    &["준호가 도와 드려서", "떡이 남아서", "준호가 돈을 내서", "준호의 생일이어서"],
                    0,
                    "할머니는 도와준 준호에게 고마워했어요.",
                    &["", "떡이 남았다는 내용은 없어요.", "돈을 냈다는 내용은 없어요.", "생일은 나오지 않아요."],
                )],
            ),
            passage(
                "market-po",
                PassageType::Poetry,
                "시장 가는 길",
                None,
                "엄마 손 잡고\n시장 가는 길\n콩닥콩닥\n내 마음도 따라가요",
                vec![question(
                    "market-po-1",
                    "'콩닥콩닥'은 말하는 이의 어떤 마음을 나타내나요?",
                    &["설레는 마음", "슬픈 마음", "화난 마음", "지루한 마음"],
                    0,
                    "시장에 가는 길이 기대되어 마음이 두근거려요.",
                    &["", "슬픈 내용은 없어요.", "화난 내용은 없어요.", "지루한 내용은 없어요."],
                )],
            ),
        ],
        grammar_questions: vec![
            question(
                "market-gr-1",
                "띄어쓰기가 바른 문장은 무엇인가요?",
                &["사과 한 개를 샀다", "사과한개를 샀다", "사과 한개를샀다", "사과한 개를샀다"],
                0,
                "수량을 나타내는 말 '개'는 앞말과 띄어 써요.",
                &["", "낱말마다 띄어 써야 해요.", "'한 개를 샀다'로 띄어 써요.", "'사과 한 개를'로 띄어 써요."],
            ),
            question(
                "market-gr-2",
                "높임 표현이 바른 것은 무엇인가요?",
                &["할머니가 밥을 먹는다", "할머니께서 진지를 잡수신다", "할머니가 진지를 먹는다", "할머니께서 밥을 먹었다"],
                1,
                "'께서', '진지', '잡수시다'가 모두 높임 표현이에요.",
                &["높임 표현이 없어요.", "", "'먹는다'를 높여야 해요.", "'밥'과 '먹었다'를 높여야 해요."],
            ),
        ],
    }
}

fn set_library() -> DailyContent {
    DailyContent {
        passages: vec![
            passage(
                "library-nf",
                PassageType::Nonfiction,
                "도서관 이용 방법",
                None,
                "도서관에서는 조용히 책을 읽어야 합니다. 책을 빌리려면 회원증이 필요합니다. \
                 빌린 책은 정해진 날까지 돌려주어야 다른 사람도 읽을 수 있습니다.",
                vec![
                    question(
                        "library-nf-1",
                        "책을 빌리려면 무엇이 필요한가요?",
                        &["회원증", "돈", "연필", "가방"],
                        0,
                        "'책을 빌리려면 회원증이 필요합니다'라고 나와 있어요.",
                        &["", "돈은 필요하지 않아요.", "연필은 나오지 않아요.", "가방은 나오지 않아요."],
                    ),
                    question(
                        "library-nf-2",
                        "빌린 책을 정해진 날까지 돌려주어야 하는 까닭은 무엇인가요?",
                        &["다른 사람도 읽을 수 있게", "책이 낡아서", "도서관이 문을 닫아서", "새 책을 사기 위해서"],
                        0,
                        "'다른 사람도 읽을 수 있습니다'라고 나와 있어요.",
                        &["", "낡았다는 내용은 없어요.", "문을 닫는다는 내용은 없어요.", "새 책을 산다는 내용은 없어요."],
                    ),
                ],
            ),
            passage(
                "library-fi",
                PassageType::Fiction,
                "잃어버린 책갈피",
                None,
                "서윤이는 아끼던 책갈피를 잃어버려 시무룩했습니다. 그때 짝꿍 하린이가 \
                 \"도서관 책상 밑에서 찾았어!\" 하며 책갈피를 내밀었습니다. 서윤이의 \
                 얼굴이 환해졌습니다.",
                vec![question(
                    "library-fi-1",
                    "서윤이의 마음은 어떻게 바뀌었나요?",
                    &["시무룩함에서 기쁨으로", "기쁨에서 슬픔으로", "화남에서 부끄러움으로", "무서움에서 놀람으로"],
                    0,
                    "시무룩했다가 책갈피를 찾고 얼굴이 환해졌어요.",
                    &["", "처음에는 시무룩했어요.", "화난 내용은 없어요.", "무서운 내용은 없어요."],
                )],
            ),
            passage(
                "library-po",
                PassageType::Poetry,
                "책 속 여행",
                None,
                "책장을 넘기면\n바다도 가고\n우주도 가요\n내 방에 앉아서",
                vec![question(
                    "library-po-1",
                    "이 시에서 말하는 이는 어디에 앉아 있나요?",
                    &["내 방", "바다", "우주", "도서관"],
                    0,
                    "'내 방에 앉아서'라고 나와 있어요.",
                    &["", "바다는 책 속에서 가는 곳이에요.", "우주는 책 속에서 가는 곳이에요.", "도서관은 나오지 않아요."],
                )],
            ),
        ],
        grammar_questions: vec![
            question(
                "library-gr-1",
                "받침이 바르게 쓰인 낱말은 무엇인가요?",
                &["읽다", "익다(책을)", "일다", "읶다"],
                0,
                "책을 보는 것은 '읽다'로 써요.",
                &["", "'익다'는 열매가 익을 때 써요.", "'일다'는 다른 뜻이에요.", "'읶다'는 없는 말이에요."],
            ),
            question(
                "library-gr-2",
                "문장 부호가 바른 것은 무엇인가요?",
                &["책을 읽었니.", "책을 읽었니?", "책을 읽었니!", "책을 읽었니,"],
                1,
                "묻는 문장 끝에는 물음표를 써요.",
                &["묻는 문장에는 마침표를 쓰지 않아요.", "", "느낌표는 느낌을 나타낼 때 써요.", "쉼표는 문장 끝에 쓰지 않아요."],
            ),
        ],
    }
}
