pub const RECIPE_COUNT_PER_PAGE: i64 = 6;
pub const USER_COUNT_PER_PAGE: i64 = 6;
pub const MAX_PAGE_SIZE: i64 = 100;

pub const FORBIDDEN_USERNAMES: &[&str] = &["me"];

pub const RECIPE_NAME_MAX_LENGTH: usize = 200;

pub const MIN_COOKING_TIME: i32 = 1;
pub const MIN_INGREDIENT_AMOUNT: i32 = 1;

pub const RECIPE_IMAGE_DIR: &str = "recipes/images";
pub const IMAGE_FORMATS: &[(&str, &str)] = &[
    ("png", "png"),
    ("jpeg", "jpg"),
    ("jpg", "jpg"),
    ("gif", "gif"),
    ("webp", "webp"),
];

pub const SHOPPING_LIST_FILENAME: &str = "shopping_list.csv";
pub const SHOPPING_LIST_HEADER: &[&str] = &["Ingredient", "Total Amount", "Measurement Unit"];

pub const IMPORT_BATCH_SIZE: usize = 1000;

pub const MAX_REQUEST_BODY_BYTES: u64 = 16 * 1024 * 1024;
