// src/engine/ui.rs — User-facing texts and keyboard builders
//
// All strings are Russian, taken verbatim from the deployed bot.

use crate::engine::catalog::Catalog;
use crate::engine::event::{CallbackPayload, InlineButton, Keyboard};

pub const NEW_USER: &str = "Добро пожаловать! Похоже, вы новый пользователь. \
     Нажмите кнопку ниже для регистрации. \
     Это не займет много времени \u{1F64F}\u{1F64F}\u{1F64F}";

pub const WELCOME_REGISTERED: &str =
    "Добро пожаловать! Воспользуйтесь меню \u{1F69B}";

pub const ALREADY_REGISTERED: &str =
    "Вы уже зарегистрированы! Воспользуйтесь меню \u{1F69B}";

pub const BANNED: &str = "Ваш  ID  заблокирован.";

pub const START_PROCESS: &str = "Начнем! \nОтветным сообщением направляйте мне нужную \
     информацию, а я ее обработаю. \nПожалуйста, вводите \
     верные данные, это очень важно для эффективность моей работы. \n\n";

pub const ASK_FULL_NAME: &str = "1/2 Напишите Вашу Фамилию Имя и Отчество";

pub const BAD_FULL_NAME: &str = "Введите реальные ФИО в формате \n \u{2757} Фамилия Имя Отчество \
     Это чрезвычайно важно.";

pub const ASK_PHONE: &str = "2/2 \u{260E} Введите номер своего контактного телефона через \"8\" без \
     пробелов, тире и прочих лишних знаков. Например \"89231234567\"";

pub const BAD_PHONE: &str = "Введите корректный номер телефона без пробелов, скобок и тире.\
     Например: 89081234567";

pub const REGISTERED_OK: &str =
    "Вы успешно зарегистрированы и теперь можете пользоваться ботом!";

pub const CANCELLED: &str = "Вы отменили текущую операцию. Давайте начнем заново.";

pub const NOTHING_TO_CANCEL: &str =
    "Сейчас нечего отменять. Попробуйте использовать главное меню.";

pub const ASK_ZONE: &str = "Выберите Технологическую зону:";

pub const ASK_LOCATION: &str = "Отправьте геолокацию";

pub const MOVING_ON: &str = "Идем дальше";

pub const ASK_REASON: &str = "Выберите причину:";

pub const ASK_PHOTO: &str = "Пришлите фото:";

pub const ASK_PLATE: &str = "Напишите госномер мусоровоза без пробелов тире и других лишних \
     символов. Пример: Е777КХ124";

pub const BAD_PLATE: &str = "Русскими буквами напишите госномер мусоровоза \
     без пробелов тире и других лишних символов. Пример: В414ТЕ124";

pub const ASK_COMMENT: &str = "Напишите комментарий к заявке:";

pub const BAD_COMMENT: &str = "Комментарий не может быть пустым. Напишите пару слов о ситуации.";

pub const REPORT_ACCEPTED: &str = "Информация принята. Спасибо!";

pub const UNKNOWN_COMMAND: &str = "Неизвестная команда";

/// Canned replies to free text outside any flow.
pub const CANNED_ANSWERS: [&str; 4] = [
    "Я могу отвечать только на вопросы выбранные из меню. Воспользуйтесь им пожалуйста.",
    "Я не наделен искусственным интеллектом. Воспользуйтесь меню пожалуйста.",
    "Попробуйте найти Ваш вопрос в меню, оно закреплено под этим сообщением.",
    "Я был бы рад поболтать, но могу отвечать только на вопросы из меню. Воспользуйтесь меню пожалуйста.",
];

/// Pick a canned answer by rotating on an arbitrary seed.
pub fn canned_answer(seed: u64) -> &'static str {
    CANNED_ANSWERS[(seed % CANNED_ANSWERS.len() as u64) as usize]
}

pub fn registration_summary(full_name: &str, phone_number: &str) -> String {
    format!(
        "Проверьте информацию:\nФИО: {full_name}\nНомер телефона: {phone_number}\n\
         Если все верно, нажмите 'ВСЕ ВЕРНО!'."
    )
}

pub fn report_summary(
    zone: &str,
    latitude: f64,
    longitude: f64,
    reason: &str,
    extra_label: &str,
    extra: &str,
) -> String {
    format!(
        "Техзона: {zone}\nГеолокация: {latitude}, {longitude}\n\
         Причина: {reason}\n{extra_label}: {extra}"
    )
}

// -- Keyboards --

pub fn cancel_keyboard() -> Keyboard {
    Keyboard::Inline(vec![vec![InlineButton::new("Отмена", CallbackPayload::Cancel)]])
}

pub fn main_menu() -> Keyboard {
    Keyboard::Inline(vec![vec![InlineButton::new(
        "Направить информацию о невывозе",
        CallbackPayload::StartReport,
    )]])
}

pub fn register_keyboard() -> Keyboard {
    Keyboard::Inline(vec![vec![InlineButton::new(
        "Зарегистрироваться",
        CallbackPayload::Register,
    )]])
}

pub fn registration_confirm_keyboard() -> Keyboard {
    Keyboard::Inline(vec![
        vec![InlineButton::new("Отмена", CallbackPayload::Cancel)],
        vec![InlineButton::new("ВСЕ ВЕРНО!", CallbackPayload::Confirm)],
    ])
}

pub fn zone_keyboard(zones: &[String]) -> Keyboard {
    Keyboard::Inline(
        zones
            .iter()
            .map(|zone| vec![InlineButton::new(zone, CallbackPayload::Zone(zone.clone()))])
            .collect(),
    )
}

pub fn location_keyboard() -> Keyboard {
    Keyboard::RequestLocation {
        label: "\u{1F4CD} Отправить геолокацию".into(),
    }
}

/// One page of the reason list plus back/next navigation where pages exist.
pub fn reason_keyboard(catalog: &Catalog, page: usize) -> Keyboard {
    let rendered = catalog.reason_page(page);
    let mut rows: Vec<Vec<InlineButton>> = rendered
        .items
        .iter()
        .map(|reason| {
            vec![InlineButton::new(
                reason,
                CallbackPayload::Reason(Catalog::reason_code(reason).to_string()),
            )]
        })
        .collect();

    let mut nav = Vec::new();
    if rendered.has_prev {
        nav.push(InlineButton::new(
            "\u{2B05} Назад",
            CallbackPayload::Page(rendered.page - 1),
        ));
    }
    if rendered.has_next {
        nav.push(InlineButton::new(
            "\u{27A1} Далее",
            CallbackPayload::Page(rendered.page + 1),
        ));
    }
    if !nav.is_empty() {
        rows.push(nav);
    }

    Keyboard::Inline(rows)
}

pub fn report_confirm_keyboard() -> Keyboard {
    Keyboard::Inline(vec![vec![
        InlineButton::new("Подтвердить", CallbackPayload::Confirm),
        InlineButton::new("Отмена", CallbackPayload::Cancel),
    ]])
}
