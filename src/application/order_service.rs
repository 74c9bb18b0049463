use std::sync::Arc;

use bigdecimal::BigDecimal;
use log::info;
use uuid::Uuid;

use crate::config::PaymentPolicy;
use crate::domain::errors::DomainError;
use crate::domain::order::{NewOrder, OrderItemInput, OrderView, PaymentMethod};
use crate::domain::ports::PaymentStore;
use crate::domain::pricing::{payment_schedule, price_cart, round_money};
use crate::domain::transaction::TransactionRecord;

#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub user_id: Uuid,
    pub address_id: Uuid,
    pub payment_method: PaymentMethod,
    pub items: Vec<OrderItemInput>,
    /// Total the client displayed, if any. Must agree with the server price.
    pub cart_total: Option<BigDecimal>,
}

#[derive(Clone)]
pub struct OrderService {
    store: Arc<dyn PaymentStore>,
    policy: PaymentPolicy,
}

impl OrderService {
    pub fn new(store: Arc<dyn PaymentStore>, policy: PaymentPolicy) -> Self {
        Self { store, policy }
    }

    /// Every online payment the order will ask for must clear the provider
    /// floor, or the order could never be paid.
    fn ensure_payable(&self, total: &BigDecimal, method: PaymentMethod) -> Result<(), DomainError> {
        let (first, balance) = payment_schedule(total, method, self.policy.cod_advance_percent)?;
        let floor = self.policy.min_amount;
        if first < floor || (balance > 0 && balance < floor) {
            return Err(DomainError::InvalidInput(format!(
                "order total {total} is too small to pay online, each payment must be at least {floor} minor units"
            )));
        }
        Ok(())
    }

    /// Prices the cart server-side and persists a PENDING order.
    pub fn create_order(&self, request: CheckoutRequest) -> Result<OrderView, DomainError> {
        let cart = price_cart(request.items)?;

        if let Some(claimed) = &request.cart_total {
            if round_money(claimed) != cart.total {
                return Err(DomainError::InvalidInput(format!(
                    "cart total {claimed} does not match the computed total {}",
                    cart.total
                )));
            }
        }

        self.ensure_payable(&cart.total, request.payment_method)?;

        let order = self.store.create(NewOrder {
            user_id: request.user_id,
            address_id: request.address_id,
            payment_method: request.payment_method,
            total_amount: cart.total,
            lines: cart.lines,
        })?;
        info!(
            "🛒️ Order {} placed by {} for {} ({})",
            order.id, order.user_id, order.total_amount, order.payment_method
        );
        Ok(order)
    }

    pub fn get_order(&self, order_id: Uuid, user_id: Uuid) -> Result<OrderView, DomainError> {
        let order = self
            .store
            .find_by_id(order_id)?
            .ok_or_else(|| DomainError::NotFound(format!("Order {order_id}")))?;
        order.ensure_owned_by(user_id)?;
        Ok(order)
    }

    pub fn list_transactions(&self, user_id: Uuid) -> Result<Vec<TransactionRecord>, DomainError> {
        self.store.list_for_user(user_id)
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;
    use crate::domain::order::PaymentStatus;
    use crate::testing::InMemoryStore;

    fn item(width: &str, height: &str, price: &str, quantity: i32) -> OrderItemInput {
        OrderItemInput {
            product_id: Uuid::new_v4(),
            quantity,
            width_cm: Some(BigDecimal::from_str(width).unwrap()),
            height_cm: Some(BigDecimal::from_str(height).unwrap()),
            price_per_sqft: BigDecimal::from_str(price).unwrap(),
            notes: None,
        }
    }

    fn service() -> OrderService {
        OrderService::new(Arc::new(InMemoryStore::default()), PaymentPolicy::default())
    }

    fn request(items: Vec<OrderItemInput>, cart_total: Option<&str>) -> CheckoutRequest {
        CheckoutRequest {
            user_id: Uuid::new_v4(),
            address_id: Uuid::new_v4(),
            payment_method: PaymentMethod::Online,
            items,
            cart_total: cart_total.map(|t| BigDecimal::from_str(t).unwrap()),
        }
    }

    #[test]
    fn order_is_priced_on_the_server() {
        let service = service();

        let order = service
            .create_order(request(vec![item("120", "90", "35", 3)], None))
            .expect("create");

        assert_eq!(order.total_amount, BigDecimal::from_str("1220.63").unwrap());
        assert_eq!(order.payment_status, PaymentStatus::Pending);
        assert_eq!(order.items.len(), 1);
    }

    #[test]
    fn disagreeing_cart_total_is_rejected() {
        let service = service();

        let err = service
            .create_order(request(vec![item("120", "90", "35", 3)], Some("999.00")))
            .unwrap_err();

        assert!(matches!(err, DomainError::InvalidInput(_)));
    }

    #[test]
    fn matching_cart_total_is_accepted() {
        let service = service();

        let order = service.create_order(request(vec![item("120", "90", "35", 3)], Some("1220.63")));

        assert!(order.is_ok());
    }

    #[test]
    fn orders_are_private_to_their_owner() {
        let service = service();
        let order = service.create_order(request(vec![item("100", "100", "10", 1)], None)).unwrap();

        assert!(service.get_order(order.id, order.user_id).is_ok());
        assert!(matches!(
            service.get_order(order.id, Uuid::new_v4()),
            Err(DomainError::Unauthorized(_))
        ));
        assert!(matches!(
            service.get_order(Uuid::new_v4(), order.user_id),
            Err(DomainError::NotFound(_))
        ));
    }

    #[test]
    fn orders_too_small_to_pay_online_are_rejected() {
        let service = service();

        // 929.03cm x 1cm at 0.50 is a 0.50 order, under the 100 paise floor.
        let err = service.create_order(request(vec![item("929.03", "1", "0.50", 1)], None)).unwrap_err();
        assert!(matches!(err, DomainError::InvalidInput(_)));

        // A 4.00 cash-on-delivery order would take a 0.80 advance.
        let mut cod = request(vec![item("929.03", "1", "4.00", 1)], None);
        cod.payment_method = PaymentMethod::CashOnDelivery;
        assert!(matches!(service.create_order(cod), Err(DomainError::InvalidInput(_))));

        let mut cod = request(vec![item("929.03", "1", "5.00", 1)], None);
        cod.payment_method = PaymentMethod::CashOnDelivery;
        assert!(service.create_order(cod).is_ok());
    }

    #[test]
    fn cod_balance_below_the_floor_is_rejected() {
        let policy = PaymentPolicy { cod_advance_percent: 99, ..PaymentPolicy::default() };
        let service = OrderService::new(Arc::new(InMemoryStore::default()), policy);
        // 99% of 50.00 leaves a 0.50 balance.
        let mut cod = request(vec![item("929.03", "1", "50.00", 1)], None);
        cod.payment_method = PaymentMethod::CashOnDelivery;

        assert!(matches!(service.create_order(cod), Err(DomainError::InvalidInput(_))));
    }
}
