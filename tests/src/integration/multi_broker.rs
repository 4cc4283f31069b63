//! # Brokers Sharing a Durable Transport
//!
//! ```text
//!            evt.js.cart.<hash>                 evt.brk.b-b
//! b-a ─────────────────────────→ b-b     b-a ─────────────────→ b-b
//! (no cart here)          cart group     checkout r1     cart r2 (direct)
//! ```

#[cfg(test)]
mod tests {
    use crate::fixtures::*;
    use kf_04_orchestrator::Receiver;
    use kf_05_durable_transport::{DurableTransport, InMemoryTransport};
    use shared_types::{event_type, Component, Event, Val};
    use std::sync::Arc;

    async fn pair() -> (TestBroker, TestBroker) {
        let transport: Arc<dyn DurableTransport> = Arc::new(InMemoryTransport::new());
        let a = TestBroker::start("b-a", resources(), Arc::clone(&transport)).await;
        let b = TestBroker::start("b-b", resources(), transport).await;
        (a, b)
    }

    #[tokio::test]
    async fn test_group_delivery_across_brokers() {
        let (a, b) = pair().await;
        let mut cart = b.connect("cart", CART_HASH, "r1", true).await;

        let evt = ingress("b-a", "GET", "/cart/3");
        let id = evt.id.clone();
        a.service
            .send_and_wait(evt, Receiver::HttpServer)
            .await
            .unwrap();

        let matched = next_delivery(&mut cart).await;
        assert_eq!(matched.event.id, id);
        assert_eq!(matched.event.param("id"), Some(&Val::from("3")));
        assert_eq!(matched.env.get("region"), Some(&Val::from("us")));
        assert!(matched.event.ttl > 0);
    }

    #[tokio::test]
    async fn test_direct_request_and_reply_across_brokers() {
        let (a, b) = pair().await;
        let mut checkout = a.connect("checkout", CHECKOUT_HASH, "r1", false).await;
        let mut cart = b.connect("cart", CART_HASH, "r2", false).await;

        let checkout_r1 = Component::new("checkout", CHECKOUT_HASH)
            .with_id("r1")
            .with_broker("b-a");
        let cart_r2 = Component::new("cart", CART_HASH)
            .with_id("r2")
            .with_broker("b-b");

        let mut request = ingress("b-a", "GET", "/cart/9");
        request.context = Some(shop_context());
        request.source = Some(checkout_r1);
        request.target = Some(cart_r2.clone());
        a.service
            .send_and_wait(request.clone(), Receiver::GrpcServer)
            .await
            .unwrap();

        let received = next_delivery(&mut cart).await;
        assert_eq!(received.event.id, request.id);
        assert_eq!(received.event.target.as_ref().unwrap().id, "r2");

        let mut reply = Event::new_response(&received.event, event_type::HTTP);
        reply.source = Some(cart_r2);
        b.service
            .send_and_wait(reply.clone(), Receiver::GrpcServer)
            .await
            .unwrap();

        let response = next_delivery(&mut checkout).await;
        assert_eq!(response.event.id, reply.id);
        assert_eq!(response.event.parent_id, request.id);
    }
}
