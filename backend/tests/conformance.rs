//! Behaviour every storage backend must share.
//!
//! Each scenario runs once per backend. The parity test replays one operation
//! sequence on both and compares every read after normalizing generated ids
//! and timestamps.

use std::collections::HashMap;

use chrono::NaiveDate;
use moneymate_backend::storage::{
    AccountStorage, BudgetStorage, CategoryStorage, ChatMessageStorage, SettingsStorage,
    TransactionStorage,
};
use moneymate_backend::{
    AppState, BackendKind, BudgetService, Database, Error, StorageConfig, ValidationError,
};
use serde::Serialize;
use serde_json::{json, Map, Value};
use shared::{
    Account, AccountType, BudgetPeriod, CategoryType, CreateAccountDto, CreateBudgetDto,
    CreateCategoryDto, CreateChatMessageDto, CreateTransactionDto, MessageRole, Transaction,
    TransactionFilter, TransactionType, UpdateTransactionDto,
};

const BACKENDS: [BackendKind; 2] = [BackendKind::ObjectStore, BackendKind::Sqlite];

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

async fn setup_test(kind: BackendKind) -> AppState {
    let database = Database::open(&StorageConfig::in_memory(kind))
        .await
        .expect("Failed to open test database");
    AppState::new(database)
}

async fn seeded_accounts(app: &AppState) -> (Account, Account) {
    let accounts = app.account_service.get_all_accounts().await.unwrap();
    (accounts[0].clone(), accounts[1].clone())
}

async fn balance_of(app: &AppState, id: &str) -> f64 {
    app.account_service
        .get_account_by_id(id)
        .await
        .unwrap()
        .unwrap()
        .balance
}

fn net_effect(transactions: &[Transaction], account_id: &str) -> f64 {
    transactions
        .iter()
        .map(|t| match t.transaction_type {
            TransactionType::Income if t.account_id == account_id => t.amount,
            TransactionType::Expense if t.account_id == account_id => -t.amount,
            TransactionType::Transfer if t.account_id == account_id => -t.amount,
            TransactionType::Transfer if t.to_account_id.as_deref() == Some(account_id) => t.amount,
            _ => 0.0,
        })
        .sum()
}

#[tokio::test]
async fn balance_matches_surviving_transactions() {
    for kind in BACKENDS {
        let app = setup_test(kind).await;
        let (cash, bank) = seeded_accounts(&app).await;
        let service = &app.transaction_service;

        let mut created = Vec::new();
        let shapes = vec![
            CreateTransactionDto::income(12_000_000.0, &bank.id, "salary"),
            CreateTransactionDto::expense(45_000.0, &cash.id, "food_coffee"),
            CreateTransactionDto::transfer(2_000_000.0, &bank.id, &cash.id),
            CreateTransactionDto::expense(350_000.0, &bank.id, "bills_electric"),
            CreateTransactionDto::transfer(100_000.0, &cash.id, &bank.id),
            CreateTransactionDto::income(500_000.0, &cash.id, "bonus"),
            CreateTransactionDto::expense(1_250_000.0, &cash.id, "shopping"),
        ];
        for dto in shapes {
            created.push(service.create_transaction(dto).await.unwrap());
        }
        for index in [1, 4] {
            service.delete_transaction(&created[index].id).await.unwrap();
        }

        let surviving = service
            .get_transactions(&TransactionFilter::default())
            .await
            .unwrap();
        assert_eq!(surviving.len(), 5, "{}", kind);

        for account in [&cash, &bank] {
            assert_eq!(
                balance_of(&app, &account.id).await,
                net_effect(&surviving, &account.id),
                "{} balance on {}",
                account.name,
                kind
            );
        }
    }
}

#[tokio::test]
async fn delete_is_inverse_of_create() {
    for kind in BACKENDS {
        let app = setup_test(kind).await;
        let (cash, bank) = seeded_accounts(&app).await;
        app.transaction_service
            .create_transaction(CreateTransactionDto::income(300_000.0, &cash.id, "gift"))
            .await
            .unwrap();

        for dto in [
            CreateTransactionDto::expense(70_000.0, &cash.id, "transport_grab"),
            CreateTransactionDto::income(1_000_000.0, &bank.id, "freelance"),
            CreateTransactionDto::transfer(250_000.0, &cash.id, &bank.id),
        ] {
            let before = (balance_of(&app, &cash.id).await, balance_of(&app, &bank.id).await);

            let tx = app.transaction_service.create_transaction(dto).await.unwrap();
            app.transaction_service.delete_transaction(&tx.id).await.unwrap();

            let after = (balance_of(&app, &cash.id).await, balance_of(&app, &bank.id).await);
            assert_eq!(before, after, "{} on {}", tx.transaction_type, kind);
        }
    }
}

#[tokio::test]
async fn update_reapplies_balance_effect() {
    for kind in BACKENDS {
        let app = setup_test(kind).await;
        let (cash, bank) = seeded_accounts(&app).await;
        let tx = app
            .transaction_service
            .create_transaction(CreateTransactionDto::expense(100_000.0, &cash.id, "food"))
            .await
            .unwrap();

        app.transaction_service
            .update_transaction(
                &tx.id,
                UpdateTransactionDto {
                    transaction_type: Some(TransactionType::Transfer),
                    to_account_id: Some(bank.id.clone()),
                    amount: Some(40_000.0),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(balance_of(&app, &cash.id).await, -40_000.0, "{}", kind);
        assert_eq!(balance_of(&app, &bank.id).await, 40_000.0, "{}", kind);

        app.transaction_service
            .update_transaction(
                &tx.id,
                UpdateTransactionDto {
                    note: Some("chỉ sửa ghi chú".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(balance_of(&app, &cash.id).await, -40_000.0, "{}", kind);
    }
}

#[tokio::test]
async fn soft_delete_cascades_to_children() {
    for kind in BACKENDS {
        let app = setup_test(kind).await;
        let categories = &app.category_service;
        let child = categories
            .create_category(CreateCategoryDto::new("Sửa xe", CategoryType::Expense).with_parent("transport"))
            .await
            .unwrap();

        categories.delete_category("transport").await.unwrap();

        for id in ["transport", "transport_gas", "transport_grab", "transport_parking", child.id.as_str()] {
            let category = categories.get_category_by_id(id).await.unwrap().unwrap();
            assert!(!category.is_active, "{} still active on {}", id, kind);
        }
        let food = categories.get_category_by_id("food").await.unwrap().unwrap();
        assert!(food.is_active);
        assert!(categories
            .get_category_tree()
            .await
            .unwrap()
            .iter()
            .all(|node| node.category.id != "transport"));
    }
}

#[tokio::test]
async fn seeding_twice_is_idempotent() {
    for kind in BACKENDS {
        let app = setup_test(kind).await;
        let db = &app.database;
        let counts = (
            db.categories().count().await.unwrap(),
            db.accounts().count().await.unwrap(),
            db.settings().count().await.unwrap(),
        );

        let report = db.seed().await.unwrap();

        assert_eq!(report.categories + report.accounts + report.settings, 0);
        assert_eq!(
            counts,
            (
                db.categories().count().await.unwrap(),
                db.accounts().count().await.unwrap(),
                db.settings().count().await.unwrap(),
            ),
            "{}",
            kind
        );
    }
}

#[tokio::test]
async fn monthly_budget_progress_boundary() {
    for kind in BACKENDS {
        let app = setup_test(kind).await;
        let (cash, _) = seeded_accounts(&app).await;
        let budgets: &BudgetService = &app.budget_service;
        let budget = budgets
            .create_budget(CreateBudgetDto {
                category_id: None,
                limit_amount: 1_000_000.0,
                period: BudgetPeriod::Monthly,
                year: 2024,
                month: Some(3),
            })
            .await
            .unwrap();

        for (amount, day) in [
            (100_000.0, date(2024, 3, 1)),
            (300_000.0, date(2024, 3, 31)),
            (999_999.0, date(2024, 4, 1)),
        ] {
            app.transaction_service
                .create_transaction(CreateTransactionDto::expense(amount, &cash.id, "food").on(day))
                .await
                .unwrap();
        }

        let progress = budgets.get_budget_progress(&budget.id).await.unwrap();
        assert_eq!(progress.spent, 400_000.0, "{}", kind);
        assert_eq!(progress.remaining, 600_000.0, "{}", kind);
        assert_eq!(progress.percentage, 40.0, "{}", kind);
    }
}

#[tokio::test]
async fn settings_merge_over_defaults() {
    for kind in BACKENDS {
        let app = setup_test(kind).await;
        let store = app.database.settings();
        for setting in store.get_all().await.unwrap() {
            store.delete(&setting.key).await.unwrap();
        }
        store.set("persona", "\"strict\"").await.unwrap();

        let settings = app.settings_service.get_settings().await.unwrap();

        assert_eq!(settings["persona"], json!("strict"), "{}", kind);
        assert_eq!(settings["currency"], json!("VND"));
        assert_eq!(settings["monthlyLimit"], json!(15_000_000));
        assert_eq!(settings["language"], json!("vi"));
    }
}

#[tokio::test]
async fn invalid_transactions_write_nothing() {
    for kind in BACKENDS {
        let app = setup_test(kind).await;
        let (cash, _) = seeded_accounts(&app).await;

        let err = app
            .transaction_service
            .create_transaction(CreateTransactionDto::expense(0.0, &cash.id, "food"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(ValidationError::NonPositiveAmount)));

        let mut transfer = CreateTransactionDto::transfer(10_000.0, &cash.id, "");
        transfer.to_account_id = None;
        let err = app
            .transaction_service
            .create_transaction(transfer)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(ValidationError::MissingDestination)));

        assert_eq!(balance_of(&app, &cash.id).await, 0.0, "{}", kind);
        assert!(app
            .transaction_service
            .get_transactions(&TransactionFilter::default())
            .await
            .unwrap()
            .is_empty());
    }
}

#[tokio::test]
async fn transfer_to_unknown_account_rolls_back() {
    for kind in BACKENDS {
        let app = setup_test(kind).await;
        let (cash, _) = seeded_accounts(&app).await;

        let err = app
            .transaction_service
            .create_transaction(CreateTransactionDto::transfer(10_000.0, &cash.id, "ghost"))
            .await
            .unwrap_err();

        assert!(err.is_not_found(), "{}", kind);
        assert_eq!(balance_of(&app, &cash.id).await, 0.0, "{}", kind);
    }
}

fn value<T: Serialize>(result: moneymate_backend::Result<T>) -> Value {
    serde_json::to_value(result.expect("read failed")).expect("serializable")
}

#[tokio::test]
async fn fractional_totals_agree() {
    let mut totals = Vec::new();
    for kind in BACKENDS {
        let app = setup_test(kind).await;
        let (cash, _) = seeded_accounts(&app).await;
        for (amount, category) in [(0.1, "food"), (0.2, "food"), (0.3, "food"), (0.7, "bills")] {
            app.transaction_service
                .create_transaction(CreateTransactionDto::expense(amount, &cash.id, category))
                .await
                .unwrap();
        }

        let stats = app.transaction_service.get_transaction_stats(None, None).await.unwrap();
        let by_category = app.transaction_service.get_category_stats(None, None).await.unwrap();
        assert_eq!(stats.total_expense, 1.3, "{}", kind);
        assert_eq!(by_category[0].category_id, "bills", "{}", kind);
        assert_eq!(by_category[1].total, 0.6, "{}", kind);
        totals.push((stats, by_category));
    }
    assert_eq!(totals[0], totals[1]);
}

#[tokio::test]
async fn transaction_category_must_exist_and_match_type() {
    for kind in BACKENDS {
        let app = setup_test(kind).await;
        let (cash, _) = seeded_accounts(&app).await;
        let service = &app.transaction_service;

        let err = service
            .create_transaction(CreateTransactionDto::income(100_000.0, &cash.id, "food"))
            .await
            .unwrap_err();
        assert!(
            matches!(err, Error::Validation(ValidationError::CategoryTypeMismatch { .. })),
            "{}",
            kind
        );

        let err = service
            .create_transaction(CreateTransactionDto::expense(100_000.0, &cash.id, "lottery"))
            .await
            .unwrap_err();
        assert!(
            matches!(err, Error::Validation(ValidationError::UnknownCategory(ref id)) if id == "lottery"),
            "{}",
            kind
        );

        assert_eq!(balance_of(&app, &cash.id).await, 0.0, "{}", kind);
        assert!(service
            .get_transactions(&TransactionFilter::default())
            .await
            .unwrap()
            .is_empty());
    }
}

/// Replace generated ids with stable labels and drop timestamps
fn normalize(value: Value, labels: &HashMap<String, String>) -> Value {
    match value {
        Value::String(s) => Value::String(labels.get(&s).cloned().unwrap_or(s)),
        Value::Array(items) => Value::Array(items.into_iter().map(|v| normalize(v, labels)).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(key, _)| key != "createdAt" && key != "updatedAt")
                .map(|(key, v)| (key, normalize(v, labels)))
                .collect(),
        ),
        other => other,
    }
}

/// One fixed sequence of writes followed by every read query
async fn replay(kind: BackendKind) -> Value {
    let app = setup_test(kind).await;
    let db = &app.database;
    let mut labels = HashMap::new();
    let mut label = |id: &str, name: String| {
        labels.insert(id.to_string(), name);
    };

    let (cash, bank) = seeded_accounts(&app).await;
    label(&cash.id, "account:cash".to_string());
    label(&bank.id, "account:bank".to_string());

    let mut dto = CreateAccountDto::new("MoMo", AccountType::EWallet);
    dto.balance = Some(50_000.0);
    let momo = app.account_service.create_account(dto).await.unwrap();
    label(&momo.id, "account:momo".to_string());

    let snack = app
        .category_service
        .create_category(CreateCategoryDto::new("Ăn vặt", CategoryType::Expense).with_parent("food"))
        .await
        .unwrap();
    label(&snack.id, "category:snack".to_string());

    let service = &app.transaction_service;
    let writes = vec![
        CreateTransactionDto::income(10_000_000.0, &bank.id, "salary").on(date(2024, 5, 1)),
        CreateTransactionDto::expense(40_000.0, &cash.id, "food_coffee").on(date(2024, 5, 2)),
        CreateTransactionDto::transfer(2_000_000.0, &bank.id, &cash.id).on(date(2024, 5, 3)),
        CreateTransactionDto::expense(30_000.0, &momo.id, &snack.id)
            .on(date(2024, 5, 3))
            .with_note("bánh tráng"),
        CreateTransactionDto::expense(500_000.0, &bank.id, "shopping_clothes").on(date(2024, 5, 20)),
        CreateTransactionDto::expense(120_000.0, &cash.id, "food_restaurant").on(date(2024, 6, 2)),
    ];
    let mut created = Vec::new();
    for (index, dto) in writes.into_iter().enumerate() {
        let tx = service.create_transaction(dto).await.unwrap();
        label(&tx.id, format!("transaction:{}", index));
        created.push(tx);
    }
    service
        .update_transaction(
            &created[1].id,
            UpdateTransactionDto {
                amount: Some(45_000.0),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    service.delete_transaction(&created[5].id).await.unwrap();
    app.account_service.delete_account(&momo.id).await.unwrap();

    for (index, dto) in [
        CreateBudgetDto {
            category_id: None,
            limit_amount: 3_000_000.0,
            period: BudgetPeriod::Monthly,
            year: 2024,
            month: Some(5),
        },
        CreateBudgetDto {
            category_id: Some("food".to_string()),
            limit_amount: 20_000_000.0,
            period: BudgetPeriod::Yearly,
            year: 2024,
            month: None,
        },
    ]
    .into_iter()
    .enumerate()
    {
        let budget = app.budget_service.create_budget(dto).await.unwrap();
        label(&budget.id, format!("budget:{}", index));
    }

    for (index, (role, content)) in [
        (MessageRole::User, "hôm nay chi bao nhiêu?"),
        (MessageRole::Model, "Bạn đã chi 45.000đ"),
        (MessageRole::User, "cảm ơn"),
    ]
    .into_iter()
    .enumerate()
    {
        let message = app
            .chat_service
            .add_message(CreateChatMessageDto::new(role, content))
            .await
            .unwrap();
        label(&message.id, format!("message:{}", index));
    }
    app.settings_service
        .update_setting("theme", &json!("dark"))
        .await
        .unwrap();

    let may = (Some(date(2024, 5, 1)), Some(date(2024, 5, 31)));
    let accounts = db.accounts();
    let categories = db.categories();
    let transactions = db.transactions();
    let budgets = db.budgets();
    let chat = db.chat_messages();
    let page = TransactionFilter {
        limit: Some(2),
        offset: Some(1),
        ..Default::default()
    };
    let large_expenses = TransactionFilter {
        transaction_type: Some(TransactionType::Expense),
        min_amount: Some(100_000.0),
        ..Default::default()
    };

    let mut reads = Map::new();
    let mut read = |query: &str, result: Value| {
        reads.insert(query.to_string(), result);
    };
    read("accounts", value(accounts.find_all().await));
    read("activeAccounts", value(accounts.find_active().await));
    read("wallets", value(accounts.find_by_type(AccountType::EWallet).await));
    read("categories", value(categories.find_all().await));
    read("foodChildren", value(categories.find_by_parent_id(Some("food")).await));
    read("roots", value(categories.find_by_parent_id(None).await));
    read("incomeCategories", value(categories.find_by_type(CategoryType::Income).await));
    read("tree", value(app.category_service.get_category_tree().await));
    read("transactions", value(transactions.find_all(&TransactionFilter::default()).await));
    read("page", value(transactions.find_all(&page).await));
    read("largeExpenses", value(transactions.find_all(&large_expenses).await));
    read("cashActivity", value(transactions.find_by_account_id(&cash.id).await));
    read("foodCoffee", value(transactions.find_by_category_id("food_coffee").await));
    read(
        "earlyMay",
        value(transactions.find_by_date_range(date(2024, 5, 1), date(2024, 5, 3)).await),
    );
    read("stats", value(transactions.get_stats(may.0, may.1).await));
    read("allTimeStats", value(transactions.get_stats(None, None).await));
    read("byCategory", value(transactions.get_stats_by_category(may.0, may.1).await));
    read("budgets", value(budgets.find_all().await));
    read("foodBudgets", value(budgets.find_by_category_id("food").await));
    read(
        "mayBudgets",
        value(budgets.find_by_period(BudgetPeriod::Monthly, 2024, Some(5)).await),
    );
    read("chatAll", value(chat.find_all(None).await));
    read("chatFirst", value(chat.find_all(Some(1)).await));
    read("chatRecent", value(chat.find_recent(2).await));
    read("settings", value(db.settings().get_all().await));
    read("mergedSettings", value(app.settings_service.get_settings().await));
    read(
        "balances",
        json!([
            balance_of(&app, &cash.id).await,
            balance_of(&app, &bank.id).await,
            balance_of(&app, &momo.id).await,
        ]),
    );

    normalize(Value::Object(reads), &labels)
}

#[tokio::test]
async fn backends_agree_on_every_read() {
    let object_store = replay(BackendKind::ObjectStore).await;
    let sqlite = replay(BackendKind::Sqlite).await;

    let (Value::Object(left), Value::Object(right)) = (&object_store, &sqlite) else {
        panic!("reads are not objects");
    };
    for (query, expected) in left {
        assert_eq!(Some(expected), right.get(query), "query {} differs", query);
    }
    assert_eq!(left.len(), right.len());

    assert_eq!(object_store["balances"], json!([1_955_000.0, 7_500_000.0, 20_000.0]));
    assert_eq!(object_store["transactions"].as_array().map(Vec::len), Some(5));
}
