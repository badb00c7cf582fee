//! Report layouts: row order, per-kind columns, and default templates.

use rust_decimal::Decimal;

use super::models::ReportKind;
use super::template::{Cell, DocxTemplate, TemplateError};
use crate::modules::books::models::Book;
use crate::utils::money;

pub const TITLE_PLACEHOLDER: &str = "{{title}}";

const INVENTORY_HEADERS: &[&str] = &[
    "Інвентарний номер",
    "Автор",
    "Назва",
    "Кількість",
    "Ціна, грн",
    "Ціна, коп",
    "Рік видання",
    "Супровідний документ",
    "УДК",
    "УДК форми документа",
];

const WRITE_OFF_HEADERS: &[&str] = &[
    "№ з/п",
    "Інвентарний номер",
    "Автор, назва",
    "Кількість",
    "Ціна",
    "Сума, грн",
    "Сума, коп",
    "Рік видання",
];

/// Numeric inventory numbers ascending; anything else after them, in its
/// original relative order.
pub fn sort_by_inventory(books: &mut [Book]) {
    books.sort_by_key(|book| match numeric(&book.inventory_number) {
        Some(n) => (false, n),
        None => (true, 0),
    });
}

fn numeric(inventory_number: &str) -> Option<u64> {
    if inventory_number.is_empty() || !inventory_number.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    inventory_number.parse().ok()
}

fn price_parts(price: Option<Decimal>) -> (Cell, Cell) {
    match price {
        Some(price) => {
            let (whole, fraction) = money::split(price);
            (Cell::number(whole), Cell::number(fraction))
        }
        None => (Cell::number(""), Cell::number("")),
    }
}

fn year(book: &Book) -> Cell {
    Cell::number(book.year_publishing.map(|y| y.to_string()).unwrap_or_default())
}

fn text(value: &Option<String>) -> Cell {
    Cell::text(value.clone().unwrap_or_default())
}

pub fn inventory_rows(books: &[Book]) -> Vec<Vec<Cell>> {
    books
        .iter()
        .map(|book| {
            let (whole, fraction) = price_parts(book.price);
            vec![
                Cell::text(book.inventory_number.clone()),
                text(&book.author),
                Cell::text(book.name.clone()),
                Cell::number("1"),
                whole,
                fraction,
                year(book),
                text(&book.check_document),
                text(&book.udk),
                text(&book.udk_form_document),
            ]
        })
        .collect()
}

/// Rows plus the total price, with unknown prices counted as zero.
pub fn write_off_rows(books: &[Book]) -> (Vec<Vec<Cell>>, Decimal) {
    let mut total = Decimal::ZERO;
    let rows = books
        .iter()
        .enumerate()
        .map(|(index, book)| {
            total += book.price.unwrap_or(Decimal::ZERO);
            let title = format!("{} {}", book.author.as_deref().unwrap_or(""), book.name);
            let (whole, fraction) = price_parts(book.price);
            vec![
                Cell::number((index + 1).to_string()),
                Cell::text(book.inventory_number.clone()),
                Cell::text(title.trim()),
                Cell::number("1"),
                Cell::number(book.price.map(money::format_comma).unwrap_or_default()),
                whole,
                fraction,
                year(book),
            ]
        })
        .collect();
    (rows, total)
}

/// Fill `template` for `kind`. `books` must already be filtered for the report.
pub fn render(
    template: &mut DocxTemplate,
    kind: ReportKind,
    title: &str,
    books: &mut [Book],
    summary_marker: &str,
) -> Result<(), TemplateError> {
    sort_by_inventory(books);
    template.replace_placeholder(TITLE_PLACEHOLDER, title);

    match kind {
        ReportKind::InventoryBook => template.append_rows(&inventory_rows(books)),
        ReportKind::WriteOffAct => {
            let (rows, total) = write_off_rows(books);
            // summary first, so book titles can never match the marker
            if !template.replace_paragraph_tail(summary_marker, &money::format_comma(total))? {
                tracing::warn!(marker = summary_marker, "summary paragraph not found in template");
            }
            template.append_rows(&rows)
        }
    }
}

/// Template shipped by `init-templates`.
pub fn default_template(kind: ReportKind, summary_marker: &str) -> Result<Vec<u8>, TemplateError> {
    match kind {
        ReportKind::InventoryBook => DocxTemplate::scaffold(TITLE_PLACEHOLDER, INVENTORY_HEADERS, None),
        ReportKind::WriteOffAct => {
            DocxTemplate::scaffold(TITLE_PLACEHOLDER, WRITE_OFF_HEADERS, Some(summary_marker))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::str::FromStr;

    fn book(number: &str, name: &str, price: Option<&str>) -> Book {
        Book {
            id: 0,
            library_id: 1,
            inventory_number: number.to_string(),
            name: name.to_string(),
            author: None,
            udk: None,
            udk_form_document: None,
            price: price.map(|p| Decimal::from_str(p).unwrap()),
            check_document: None,
            year_publishing: None,
            removed: None,
            create_at: Utc::now(),
        }
    }

    fn numbers(books: &[Book]) -> Vec<&str> {
        books.iter().map(|b| b.inventory_number.as_str()).collect()
    }

    #[test]
    fn numeric_numbers_first_then_others_in_place() {
        let mut books = vec![
            book("10", "a", None),
            book("B-2", "b", None),
            book("9", "c", None),
            book("A-1", "d", None),
            book("100", "e", None),
            book("+5", "f", None),
        ];
        sort_by_inventory(&mut books);
        assert_eq!(numbers(&books), vec!["9", "10", "100", "B-2", "A-1", "+5"]);
    }

    #[test]
    fn write_off_row_layout() {
        let mut kobzar = book("7", "Kobzar", Some("1234.5"));
        kobzar.author = Some("Shevchenko".to_string());
        kobzar.year_publishing = Some(1840);
        let nameless_author = book("8", "Anthology", None);

        let (rows, total) = write_off_rows(&[kobzar, nameless_author]);
        assert_eq!(
            rows[0],
            vec![
                Cell::number("1"),
                Cell::text("7"),
                Cell::text("Shevchenko Kobzar"),
                Cell::number("1"),
                Cell::number("1234,50"),
                Cell::number("1234"),
                Cell::number("50"),
                Cell::number("1840"),
            ]
        );
        assert_eq!(rows[1][2], Cell::text("Anthology"));
        assert_eq!(rows[1][4], Cell::number(""));
        assert_eq!(total, Decimal::from_str("1234.5").unwrap());
    }

    #[test]
    fn inventory_row_layout() {
        let mut b = book("3", "Dictionary", Some("0.99"));
        b.author = Some("Hrinchenko".to_string());
        b.check_document = Some("Act 12".to_string());
        b.udk = Some("811.161.2".to_string());
        b.udk_form_document = Some("(038)".to_string());

        let rows = inventory_rows(&[b]);
        assert_eq!(
            rows[0],
            vec![
                Cell::text("3"),
                Cell::text("Hrinchenko"),
                Cell::text("Dictionary"),
                Cell::number("1"),
                Cell::number("0"),
                Cell::number("99"),
                Cell::number(""),
                Cell::text("Act 12"),
                Cell::text("811.161.2"),
                Cell::text("(038)"),
            ]
        );
    }

    #[test]
    fn write_off_render_fills_title_rows_and_total() {
        let marker = "Всього на суму";
        let bytes = default_template(ReportKind::WriteOffAct, marker).unwrap();
        let mut template = DocxTemplate::from_bytes(bytes).unwrap();
        let mut books = vec![
            book("12", "Second", Some("10.10")),
            book("2", "First", None),
            book("3", "Third", Some("5")),
        ];

        render(&mut template, ReportKind::WriteOffAct, "Act March", &mut books, marker).unwrap();

        let xml = template.document_xml();
        assert!(xml.contains("Act March"));
        assert!(!xml.contains(TITLE_PLACEHOLDER));
        assert!(xml.contains("Всього на суму 15,10"));
        let first = xml.find(">First<").unwrap();
        let third = xml.find(">Third<").unwrap();
        let second = xml.find(">Second<").unwrap();
        assert!(first < third && third < second);
    }

    #[test]
    fn inventory_render_appends_one_row_per_book() {
        let bytes = default_template(ReportKind::InventoryBook, "unused").unwrap();
        let mut template = DocxTemplate::from_bytes(bytes).unwrap();
        let mut books = vec![book("5", "Odyssey", Some("7")), book("4", "Iliad", None)];

        render(&mut template, ReportKind::InventoryBook, "Inventory 2024", &mut books, "unused")
            .unwrap();

        let xml = template.document_xml();
        // header row plus two books
        assert_eq!(xml.matches("<w:tr>").count(), 3);
        assert!(xml.find(">Iliad<").unwrap() < xml.find(">Odyssey<").unwrap());
        assert!(xml.contains("Inventory 2024"));
    }
}
